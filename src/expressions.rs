use evalexpr::{ContextWithMutableVariables, DefaultNumericTypes, EvalexprError, HashMapContext, Node, Value};

use crate::feature::FeatureValue;
use crate::stat_error::{StatError, StatResult};

/// A compiled arithmetic/boolean expression.
///
/// The string is parsed once into an operator tree and evaluated many times against a
/// context of bound parameters. Supports the usual numeric operators, comparisons,
/// boolean logic and evalexpr's builtin functions (`min`, `max`, `floor`, ...).
#[derive(Debug, Clone)]
pub struct Expression {
    pub(crate) definition: String,
    pub(crate) compiled: Node<DefaultNumericTypes>,
}

/// What an expression evaluated to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectOutput {
    Number(f64),
    Flag(bool),
}

impl Expression {
    /// Parses and compiles an expression string.
    ///
    /// # Returns
    ///
    /// `Err(StatError::ExpressionError)` if the string is not a valid expression.
    pub fn new(expression: &str) -> StatResult<Self> {
        let compiled = evalexpr::build_operator_tree(expression).map_err(|err| StatError::ExpressionError {
            expression: expression.to_string(),
            details: err.to_string(),
        })?;

        let expression = Self {
            definition: expression.to_string(),
            compiled,
        };
        expression.dry_run()?;
        Ok(expression)
    }

    // The parser accepts some malformed input (`A + * 2`) that only fails once evaluated.
    // Evaluate once with every variable bound to 1.0 and reject shape errors. Type errors
    // are let through, since bool features are bound as booleans at runtime.
    fn dry_run(&self) -> StatResult<()> {
        let mut context: HashMapContext<DefaultNumericTypes> = HashMapContext::new();
        for name in self.compiled.iter_variable_identifiers() {
            context
                .set_value(name.to_string(), Value::Float(1.0))
                .map_err(|e| StatError::ExpressionError { expression: self.definition.clone(), details: e.to_string() })?;
        }

        match self.compiled.eval_with_context(&context) {
            Err(err) if is_malformed(&err) => Err(StatError::ExpressionError {
                expression: self.definition.clone(),
                details: err.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Identifiers the expression reads, excluding function names.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.compiled.iter_variable_identifiers()
    }

    /// Evaluates against `context` without reparsing.
    ///
    /// Unlike stat totals, a missing identifier is an error here: an effect with an
    /// unresolved reference must be skipped rather than computed against a made-up zero.
    pub fn evaluate(&self, context: &HashMapContext<DefaultNumericTypes>) -> StatResult<EffectOutput> {
        let value = self
            .compiled
            .eval_with_context(context)
            .map_err(|e| StatError::ExpressionError { expression: self.definition.clone(), details: e.to_string() })?;

        match value {
            Value::Boolean(flag) => Ok(EffectOutput::Flag(flag)),
            other => other
                .as_number()
                .map(EffectOutput::Number)
                .map_err(|e| StatError::ExpressionError { expression: self.definition.clone(), details: e.to_string() }),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

fn is_malformed(err: &EvalexprError<DefaultNumericTypes>) -> bool {
    matches!(
        err,
        EvalexprError::WrongOperatorArgumentAmount { .. }
            | EvalexprError::WrongFunctionArgumentAmount { .. }
            | EvalexprError::FunctionIdentifierNotFound(_)
    )
}

/// Binds one parameter symbol in an evaluation context.
pub(crate) fn bind_symbol(
    context: &mut HashMapContext<DefaultNumericTypes>,
    symbol: char,
    value: FeatureValue,
) -> StatResult<()> {
    context
        .set_value(symbol.to_string(), value.to_eval_value())
        .map_err(|e| StatError::ExpressionError { expression: symbol.to_string(), details: e.to_string() })
}
