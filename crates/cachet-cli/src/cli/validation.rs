/// Parse an `--entry NAME=SPECIFIER` argument.
///
/// The name becomes the chunk name, so it may not contain path separators.
///
/// # Errors
///
/// Returns an error message if either side is empty or the name is not a
/// plain file name.
pub fn parse_entry(s: &str) -> Result<(String, String), String> {
    let Some((name, specifier)) = s.split_once('=') else {
        return Err(format!("expected NAME=SPECIFIER, got '{s}'"));
    };
    let (name, specifier) = (name.trim(), specifier.trim());

    if name.is_empty() {
        return Err("entry name cannot be empty".to_string());
    }
    if specifier.is_empty() {
        return Err(format!("entry '{name}' has no specifier"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!("entry name must be a plain file name: '{name}'"));
    }

    Ok((name.to_string(), specifier.to_string()))
}
