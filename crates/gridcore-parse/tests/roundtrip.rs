use gridcore_parse::{parse, unparse};
use proptest::prelude::*;

fn cell_ref() -> impl Strategy<Value = String> {
    (0u32..16, 0u32..999).prop_map(|(col, row)| {
        format!("{}{}", gridcore_parse::ast::col_letters(col), row + 1)
    })
}

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        (0i64..1000).prop_map(|n| n.to_string()),
        cell_ref(),
    ]
}

fn expr() -> impl Strategy<Value = String> {
    let leaf = leaf();
    leaf.prop_recursive(4, 64, 4, |inner| {
        prop_oneof![
            (inner.clone(), "[+\\-*/]", inner.clone())
                .prop_map(|(l, op, r)| format!("({l}{op}{r})")),
        ]
    })
}

proptest! {
    #[test]
    fn unparse_of_parse_is_idempotent(e in expr()) {
        let formula = format!("={e}");
        let ast = parse(&formula).expect("formula should parse");
        let canonical = unparse(&ast);
        let reparsed = parse(&canonical).expect("canonical form should reparse");
        let recanonical = unparse(&reparsed);
        prop_assert_eq!(canonical, recanonical);
    }
}
