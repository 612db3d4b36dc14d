//! Defense-in-depth PHI pattern guard.
//!
//! This is deliberately not a PHI scanner — it rejects a small set of
//! unambiguous direct-identifier shapes (SSN, phone, email) that should
//! never appear in a note body handed to the issuer. A clean result here
//! is not a clearance; it only means none of these specific shapes matched.

/// Returns the names of every pattern that matched, empty if none did.
pub fn detect_phi_patterns(text: &str) -> Vec<String> {
    let mut hits = Vec::new();
    if contains_ssn_shape(text) {
        hits.push("ssn_shaped".to_string());
    }
    if contains_phone_shape(text) {
        hits.push("phone_shaped".to_string());
    }
    if contains_email_shape(text) {
        hits.push("email_shaped".to_string());
    }
    hits
}

/// `###-##-####`.
fn contains_ssn_shape(text: &str) -> bool {
    let bytes: Vec<char> = text.chars().collect();
    for start in 0..bytes.len() {
        let window: String = bytes.iter().skip(start).take(11).collect();
        if window.len() < 11 {
            break;
        }
        let chars: Vec<char> = window.chars().collect();
        let shape = [true, true, true, false, true, true, false, true, true, true, true];
        let matches = chars.iter().zip(shape.iter()).all(|(c, &is_digit)| {
            if is_digit {
                c.is_ascii_digit()
            } else {
                *c == '-'
            }
        });
        if matches {
            return true;
        }
    }
    false
}

/// A run of 10-11 digits, optionally separated by `-`, `.`, or spaces, that
/// collapses to exactly 10 or 11 raw digits — loose enough to catch
/// `(555) 123-4567` and `555-123-4567` without flagging arbitrary numerics.
fn contains_phone_shape(text: &str) -> bool {
    let mut digits_run = String::new();
    let mut separators_only = true;
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits_run.push(c);
        } else if c == '-' || c == '.' || c == ' ' || c == '(' || c == ')' {
            // allowed separator inside a candidate run; keep accumulating
        } else {
            if separators_only && (digits_run.len() == 10 || digits_run.len() == 11) {
                return true;
            }
            digits_run.clear();
            separators_only = true;
        }
    }
    digits_run.len() == 10 || digits_run.len() == 11
}

/// `local@domain.tld`, minimal shape check only.
fn contains_email_shape(text: &str) -> bool {
    text.split_whitespace().any(|token| {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '.');
        match token.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            }
            None => false,
        }
    })
}
