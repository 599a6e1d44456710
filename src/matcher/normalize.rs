/// Lowercase, collapse whitespace, and drop middle tokens.
///
/// Names with more than two tokens are reduced to `first last`. The result is
/// only used for comparison; stored names are never rewritten.
pub fn normalize_name(name: &str) -> String {
    let tokens: Vec<String> = name.split_whitespace().map(str::to_lowercase).collect();

    match tokens.as_slice() {
        [first, .., last] if tokens.len() > 2 => format!("{first} {last}"),
        _ => tokens.join(" "),
    }
}

/// Uppercased first letter of a name, if any.
pub fn initial(name: &str) -> Option<String> {
    name.trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
}

/// Search-name variants in the order they should be tried.
///
/// With a middle name: `First Middle Last`, `First M Last`, `First Last`.
/// Without: `First Last`, `First L`, `Last First`.
pub fn name_variants(first: &str, middle: Option<&str>, last: &str) -> Vec<String> {
    let first = first.trim();
    let last = last.trim();
    let middle = middle.map(str::trim).filter(|m| !m.is_empty());

    let mut variants = Vec::new();
    if first.is_empty() || last.is_empty() {
        let single = if first.is_empty() { last } else { first };
        if !single.is_empty() {
            variants.push(single.to_string());
        }
        return variants;
    }

    match middle {
        Some(middle) => {
            variants.push(format!("{first} {middle} {last}"));
            if let Some(m) = initial(middle) {
                variants.push(format!("{first} {m} {last}"));
            }
            variants.push(format!("{first} {last}"));
        }
        None => {
            variants.push(format!("{first} {last}"));
            if let Some(l) = last.chars().next() {
                variants.push(format!("{first} {l}"));
            }
            variants.push(format!("{last} {first}"));
        }
    }

    variants.dedup();
    variants
}
