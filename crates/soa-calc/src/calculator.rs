//! Arithmetic handlers for the `calc` service.

use soa_core::service::{
    ArgumentError, CallArgs, DispatchStrategy, HandlerError, ParamValue, ServiceBuilder,
};

/// Routing key the calculator registers under.
pub const SERVICE_NAME: &str = "calc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
        }
    }

    fn doc(&self) -> &'static str {
        match self {
            Operation::Add => "Add two numbers: add <a> <b>",
            Operation::Subtract => "Subtract b from a: subtract <a> <b>",
            Operation::Multiply => "Multiply two numbers: multiply <a> <b>",
            Operation::Divide => "Divide a by b: divide <a> <b>",
        }
    }

    /// Apply to two coerced arguments.
    ///
    /// Integer operands stay integral unless the operation overflows;
    /// division always yields a float.
    pub fn apply(&self, a: &ParamValue, b: &ParamValue) -> Result<ParamValue, HandlerError> {
        if let (ParamValue::Int(x), ParamValue::Int(y)) = (a, b) {
            let exact = match self {
                Operation::Add => x.checked_add(*y),
                Operation::Subtract => x.checked_sub(*y),
                Operation::Multiply => x.checked_mul(*y),
                Operation::Divide => None,
            };
            if let Some(value) = exact {
                return Ok(ParamValue::Int(value));
            }
        }

        let (x, y) = (a.number()?, b.number()?);
        let value = match self {
            Operation::Add => x + y,
            Operation::Subtract => x - y,
            Operation::Multiply => x * y,
            Operation::Divide => {
                if y == 0.0 {
                    return Err("Division by zero is not allowed".into());
                }
                x / y
            }
        };
        Ok(ParamValue::Float(value))
    }

    /// Handle one call: `"{a} {op} {b} = {result}"`.
    ///
    /// The operands are echoed as typed, so `2.50` stays `2.50`.
    pub fn handle(&self, params: &str) -> Result<String, HandlerError> {
        let tokens: Vec<&str> = params.split_whitespace().collect();
        let &[a, b] = tokens.as_slice() else {
            return Err(ArgumentError::Arity {
                expected: 2,
                got: tokens.len(),
            }
            .into());
        };
        let result = self.apply(&ParamValue::coerce(a), &ParamValue::coerce(b))?;
        Ok(format!("{} {} {} = {}", a, self.symbol(), b, result))
    }
}

/// Register every operation on `builder`.
///
/// Switches the service to raw passthrough; each handler splits its own
/// operands.
pub fn install(mut builder: ServiceBuilder) -> ServiceBuilder {
    builder = builder.strategy(DispatchStrategy::RawPassthrough);
    for op in Operation::ALL {
        builder = builder.method_with_doc(op.method_name(), op.doc(), move |args: CallArgs| {
            op.handle(args.raw().unwrap_or_default())
        });
    }
    builder
}
