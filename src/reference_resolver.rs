use crate::expressions::Expression;
use crate::stat_addressing::{scan_references, Side, StatRef, StoreKindRegistry};
use crate::stat_error::{StatError, StatResult};

/// Upper bound on references per expression: `A`..`Z` then `a`..`z`.
pub const MAX_SYMBOLS: usize = 52;

fn symbol_for(index: usize) -> Option<char> {
    match index {
        0..=25 => Some((b'A' + index as u8) as char),
        26..=51 => Some((b'a' + (index - 26) as u8) as char),
        _ => None,
    }
}

/// An expression whose `@Class.N` / `!Class.N` placeholders were replaced by parameter
/// symbols, together with the addresses those symbols stand for.
///
/// `local_refs[i]` is bound to `local_symbols[i]`, and likewise for the external side.
#[derive(Debug, Clone)]
pub struct ReferencedExpression {
    source: String,
    expression: Expression,
    local_refs: Vec<StatRef>,
    local_symbols: Vec<char>,
    extern_refs: Vec<StatRef>,
    extern_symbols: Vec<char>,
}

impl ReferencedExpression {
    /// Substitutes references and compiles the result.
    ///
    /// Local references are numbered first, left to right, then external ones, from one
    /// shared counter. The same input always gives the same symbols.
    pub fn compile(source: &str, registry: &StoreKindRegistry) -> StatResult<Self> {
        reject_stray_identifiers(source)?;

        let mut next_symbol = 0usize;
        let (after_locals, local_refs, local_symbols) =
            substitute_side(source, source, Side::Local, registry, &mut next_symbol)?;
        let (substituted, extern_refs, extern_symbols) =
            substitute_side(source, &after_locals, Side::External, registry, &mut next_symbol)?;

        let expression = Expression::new(&substituted)?;

        Ok(Self {
            source: source.to_string(),
            expression,
            local_refs,
            local_symbols,
            extern_refs,
            extern_symbols,
        })
    }

    /// The expression as written in config, before substitution.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn local_refs(&self) -> &[StatRef] {
        &self.local_refs
    }

    pub fn local_symbols(&self) -> &[char] {
        &self.local_symbols
    }

    pub fn extern_refs(&self) -> &[StatRef] {
        &self.extern_refs
    }

    pub fn extern_symbols(&self) -> &[char] {
        &self.extern_symbols
    }

    pub fn has_external_refs(&self) -> bool {
        !self.extern_refs.is_empty()
    }
}

// Identifiers must come from references. Checked on the source with every reference
// blanked out, so a bare `B` cannot alias a symbol assigned later.
fn reject_stray_identifiers(source: &str) -> StatResult<()> {
    let mut spans: Vec<_> = scan_references(source, Side::Local)
        .into_iter()
        .chain(scan_references(source, Side::External))
        .map(|reference| reference.span)
        .collect();
    spans.sort_by_key(|span| span.start);

    let mut blanked = String::with_capacity(source.len());
    let mut cursor = 0;
    for span in spans {
        blanked.push_str(&source[cursor..span.start]);
        blanked.push('1');
        cursor = span.end;
    }
    blanked.push_str(&source[cursor..]);

    let skeleton = Expression::new(&blanked).map_err(|err| match err {
        StatError::ExpressionError { details, .. } => StatError::ExpressionError {
            expression: source.to_string(),
            details,
        },
        other => other,
    })?;
    if let Some(stray) = skeleton.variables().next() {
        return Err(StatError::UnboundSymbol {
            expression: source.to_string(),
            symbol: stray.to_string(),
        });
    }
    Ok(())
}

fn substitute_side(
    source: &str,
    text: &str,
    side: Side,
    registry: &StoreKindRegistry,
    next_symbol: &mut usize,
) -> StatResult<(String, Vec<StatRef>, Vec<char>)> {
    let mut output = String::with_capacity(text.len());
    let mut refs = Vec::new();
    let mut symbols = Vec::new();
    let mut cursor = 0;

    for reference in scan_references(text, side) {
        let stat = reference.resolve(registry)?;
        let symbol = symbol_for(*next_symbol).ok_or(StatError::TooManyReferences {
            expression: source.to_string(),
            limit: MAX_SYMBOLS,
        })?;
        *next_symbol += 1;

        output.push_str(&text[cursor..reference.span.start]);
        output.push(symbol);
        cursor = reference.span.end;

        refs.push(stat);
        symbols.push(symbol);
    }
    output.push_str(&text[cursor..]);

    Ok((output, refs, symbols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StoreKindRegistry {
        let mut registry = StoreKindRegistry::new();
        registry.register("Char");
        registry.register("Weapon");
        registry
    }

    #[test]
    fn locals_are_numbered_before_externals() {
        let compiled = ReferencedExpression::compile("!Char.1 + @Weapon.2 * @Char.3", &registry()).unwrap();

        assert_eq!(compiled.expression().definition(), "C + A * B");
        assert_eq!(compiled.local_symbols(), &['A', 'B']);
        assert_eq!(compiled.local_refs(), &[StatRef::new(1, 2), StatRef::new(0, 3)]);
        assert_eq!(compiled.extern_symbols(), &['C']);
        assert_eq!(compiled.extern_refs(), &[StatRef::new(0, 1)]);
    }

    #[test]
    fn repeated_references_get_their_own_symbols() {
        let compiled = ReferencedExpression::compile("@Char.1 * @Char.1", &registry()).unwrap();
        assert_eq!(compiled.expression().definition(), "A * B");
        assert_eq!(compiled.local_refs(), &[StatRef::new(0, 1), StatRef::new(0, 1)]);
    }

    #[test]
    fn unregistered_class_fails() {
        let result = ReferencedExpression::compile("@Shield.1 + 1", &registry());
        assert!(matches!(result, Err(StatError::UnknownStoreKind { class_name }) if class_name == "Shield"));
    }

    #[test]
    fn stray_identifiers_fail_at_compile_time() {
        let result = ReferencedExpression::compile("@Char.1 + bonus", &registry());
        assert!(matches!(result, Err(StatError::UnboundSymbol { symbol, .. }) if symbol == "bonus"));
    }

    #[test]
    fn bare_identifiers_cannot_alias_symbols() {
        let result = ReferencedExpression::compile("@Char.1 + B + @Char.2", &registry());
        assert!(matches!(result, Err(StatError::UnboundSymbol { symbol, .. }) if symbol == "B"));

        let result = ReferencedExpression::compile("!Char.1 * A", &registry());
        assert!(matches!(result, Err(StatError::UnboundSymbol { symbol, .. }) if symbol == "A"));
    }

    #[test]
    fn malformed_expressions_fail_at_compile_time() {
        let result = ReferencedExpression::compile("@Char.1 + * 2", &registry());
        assert!(matches!(result, Err(StatError::ExpressionError { expression, .. }) if expression == "@Char.1 + * 2"));
    }

    #[test]
    fn functions_are_not_stray() {
        let compiled = ReferencedExpression::compile("max(@Char.1, !Weapon.2) + floor(1.5)", &registry()).unwrap();
        assert_eq!(compiled.expression().definition(), "max(A, B) + floor(1.5)");
    }

    #[test]
    fn symbol_space_is_bounded() {
        let source = vec!["@Char.1"; MAX_SYMBOLS + 1].join(" + ");
        let result = ReferencedExpression::compile(&source, &registry());
        assert!(matches!(result, Err(StatError::TooManyReferences { .. })));
    }

    #[test]
    fn constant_expressions_have_no_refs() {
        let compiled = ReferencedExpression::compile("5 * 2", &registry()).unwrap();
        assert!(compiled.local_refs().is_empty());
        assert!(!compiled.has_external_refs());
    }
}
