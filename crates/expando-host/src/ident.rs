//! Host-legal identifiers

/// Identifier under which a type name is exposed to the host
///
/// Generic arity markers and argument lists are dropped, namespace separators
/// and any other character not legal in an identifier become `_`, and a
/// leading character that cannot start an identifier is prefixed with `_`.
///
/// # Examples
/// - ``List`1`` → `List`
/// - `Map<text, int32>` → `Map`
/// - `Qiif::Invoice+Line` → `Qiif_Invoice_Line`
#[must_use]
pub fn host_identifier(name: &str) -> String {
    let end = name.find(['`', '<', '[']).unwrap_or(name.len());
    let base = name[..end].trim().replace("::", "_");

    let mut ident: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if ident.is_empty() {
        ident.push('_');
    }
    if ident.starts_with(|c: char| !c.is_alphabetic() && c != '_' && c != '$') {
        ident.insert(0, '_');
    }
    ident
}
