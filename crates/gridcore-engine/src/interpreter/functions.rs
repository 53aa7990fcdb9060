//! Built-in function registry. A plain trait object map rather than the
//! capability-flagged dispatch a full workbook engine would need: this
//! core only has to support the handful of functions spec §8's scenarios
//! exercise, so a `FxHashMap<String, Box<dyn Function>>` is the whole
//! story.

use rustc_hash::FxHashMap;

use gridcore_common::{CellError, CellValue, ErrorKind};

use super::{ArgValue, EvaluationContext};

pub trait Function: Send + Sync {
    fn call(&self, args: &[ArgValue], ctx: &mut dyn EvaluationContext) -> CellValue;
}

pub struct FunctionRegistry {
    functions: FxHashMap<String, Box<dyn Function>>,
}

impl FunctionRegistry {
    pub fn with_builtins() -> Self {
        let mut functions: FxHashMap<String, Box<dyn Function>> = FxHashMap::default();
        functions.insert("SUM".into(), Box::new(Sum));
        functions.insert("AVERAGE".into(), Box::new(Average));
        functions.insert("COUNT".into(), Box::new(Count));
        functions.insert("COUNTA".into(), Box::new(CountA));
        functions.insert("MAX".into(), Box::new(Max));
        functions.insert("MIN".into(), Box::new(Min));
        functions.insert("IF".into(), Box::new(If));
        functions.insert("NOT".into(), Box::new(Not));
        functions.insert("AND".into(), Box::new(And));
        functions.insert("OR".into(), Box::new(Or));
        functions.insert("NOW".into(), Box::new(Now));
        functions.insert("TODAY".into(), Box::new(Today));
        functions.insert("RAND".into(), Box::new(Rand));
        functions.insert("CONCATENATE".into(), Box::new(Concatenate));
        FunctionRegistry { functions }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(&name.to_ascii_uppercase()).map(|f| f.as_ref())
    }

    pub fn register(&mut self, name: &str, f: Box<dyn Function>) {
        self.functions.insert(name.to_ascii_uppercase(), f);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn numeric_values(args: &[ArgValue]) -> Result<Vec<f64>, CellError> {
    let mut out = Vec::new();
    for a in args {
        for v in a.flatten() {
            match v {
                CellValue::Error(e) => return Err(e),
                CellValue::Empty => {}
                CellValue::Text(ref s) if s.is_empty() => {}
                other => out.push(other.coerce_number()?),
            }
        }
    }
    Ok(out)
}

struct Sum;
impl Function for Sum {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        match numeric_values(args) {
            Ok(nums) => CellValue::Number(nums.iter().sum()),
            Err(e) => CellValue::Error(e),
        }
    }
}

struct Average;
impl Function for Average {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        match numeric_values(args) {
            Ok(nums) if nums.is_empty() => CellValue::Error(CellError::new(ErrorKind::DivByZero)),
            Ok(nums) => CellValue::Number(nums.iter().sum::<f64>() / nums.len() as f64),
            Err(e) => CellValue::Error(e),
        }
    }
}

struct Count;
impl Function for Count {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        let count = args
            .iter()
            .flat_map(|a| a.flatten())
            .filter(|v| matches!(v, CellValue::Number(_)))
            .count();
        CellValue::Number(count as f64)
    }
}

struct CountA;
impl Function for CountA {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        let count = args
            .iter()
            .flat_map(|a| a.flatten())
            .filter(|v| !matches!(v, CellValue::Empty))
            .count();
        CellValue::Number(count as f64)
    }
}

struct Max;
impl Function for Max {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        match numeric_values(args) {
            Ok(nums) if nums.is_empty() => CellValue::Number(0.0),
            Ok(nums) => CellValue::Number(nums.into_iter().fold(f64::NEG_INFINITY, f64::max)),
            Err(e) => CellValue::Error(e),
        }
    }
}

struct Min;
impl Function for Min {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        match numeric_values(args) {
            Ok(nums) if nums.is_empty() => CellValue::Number(0.0),
            Ok(nums) => CellValue::Number(nums.into_iter().fold(f64::INFINITY, f64::min)),
            Err(e) => CellValue::Error(e),
        }
    }
}

struct If;
impl Function for If {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        if args.is_empty() {
            return CellValue::Error(CellError::new(ErrorKind::Value));
        }
        let cond = args[0].scalar();
        if let CellValue::Error(_) = cond {
            return cond;
        }
        match cond.coerce_bool() {
            Ok(true) => args.get(1).map(ArgValue::scalar).unwrap_or(CellValue::Bool(true)),
            Ok(false) => args.get(2).map(ArgValue::scalar).unwrap_or(CellValue::Bool(false)),
            Err(e) => CellValue::Error(e),
        }
    }
}

struct Not;
impl Function for Not {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        match args.first().map(ArgValue::scalar) {
            Some(v) => match v.coerce_bool() {
                Ok(b) => CellValue::Bool(!b),
                Err(e) => CellValue::Error(e),
            },
            None => CellValue::Error(CellError::new(ErrorKind::Value)),
        }
    }
}

struct And;
impl Function for And {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        let mut acc = true;
        for a in args {
            for v in a.flatten() {
                match v.coerce_bool() {
                    Ok(b) => acc &= b,
                    Err(e) => return CellValue::Error(e),
                }
            }
        }
        CellValue::Bool(acc)
    }
}

struct Or;
impl Function for Or {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        let mut acc = false;
        for a in args {
            for v in a.flatten() {
                match v.coerce_bool() {
                    Ok(b) => acc |= b,
                    Err(e) => return CellValue::Error(e),
                }
            }
        }
        CellValue::Bool(acc)
    }
}

struct Now;
impl Function for Now {
    fn call(&self, _args: &[ArgValue], ctx: &mut dyn EvaluationContext) -> CellValue {
        CellValue::Number(ctx.now())
    }
}

struct Today;
impl Function for Today {
    fn call(&self, _args: &[ArgValue], ctx: &mut dyn EvaluationContext) -> CellValue {
        CellValue::Number(ctx.now().floor())
    }
}

struct Rand;
impl Function for Rand {
    fn call(&self, _args: &[ArgValue], ctx: &mut dyn EvaluationContext) -> CellValue {
        CellValue::Number(ctx.random())
    }
}

struct Concatenate;
impl Function for Concatenate {
    fn call(&self, args: &[ArgValue], _ctx: &mut dyn EvaluationContext) -> CellValue {
        let mut s = String::new();
        for a in args {
            for v in a.flatten() {
                s.push_str(&v.coerce_text());
            }
        }
        CellValue::Text(s)
    }
}
