use rand::Rng;

use crate::core::error::InvalidConfigError;

/// The length of names generated when no candidate is given.
pub const DEFAULT_NAME_LENGTH: usize = 8;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LETTERS_AND_DIGITS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random name of the given length.
///
/// The first character is always an ASCII letter. The rest are ASCII letters or digits.
pub fn generate_name<R>(rng: &mut R, length: usize) -> String
where
    R: Rng + ?Sized,
{
    let length = length.max(1);
    let mut name = String::with_capacity(length);
    name.push(LETTERS[rng.random_range(0..LETTERS.len())] as char);
    name.extend(
        (1..length).map(|_| LETTERS_AND_DIGITS[rng.random_range(0..LETTERS_AND_DIGITS.len())] as char),
    );
    name
}

/// Picks a name that `taken` does not report as already in use.
///
/// The candidate is used as-is if it is free. Otherwise, names are generated, each one character
/// longer than the name that collided, until a free one is found.
pub fn unique_name<F>(candidate: Option<String>, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut rng = rand::rng();
    let mut name = match candidate {
        Some(name) => name,
        None => generate_name(&mut rng, DEFAULT_NAME_LENGTH),
    };
    while taken(&name) {
        name = generate_name(&mut rng, name.chars().count() + 1);
    }
    name
}

/// Validates a caller-supplied name.
///
/// Names are used as path segments in the shell, so they cannot be empty, contain whitespace or
/// dots, or start with the handle marker `#`.
pub fn validate_name(name: &str) -> Result<(), InvalidConfigError> {
    if name.is_empty() {
        return Err(InvalidConfigError::new("name cannot be empty"));
    }
    if name.starts_with('#') {
        return Err(InvalidConfigError::new(format!(
            "name {name:?} cannot start with #"
        )));
    }
    if name.chars().any(|c| c == '.' || c.is_whitespace()) {
        return Err(InvalidConfigError::new(format!(
            "name {name:?} cannot contain dots or whitespace"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod generator_test {
    use ahash::HashSet;
    use regex::Regex;

    use crate::names::generator::{
        DEFAULT_NAME_LENGTH,
        generate_name,
        unique_name,
        validate_name,
    };

    #[test]
    fn generates_letter_followed_by_alphanumerics() {
        let pattern = Regex::new(r"^[A-Za-z][A-Za-z0-9]{7}$").unwrap();
        let mut rng = rand::rng();
        for _ in 0..200 {
            let name = generate_name(&mut rng, DEFAULT_NAME_LENGTH);
            assert!(pattern.is_match(&name), "{name}");
        }
    }

    #[test]
    fn generates_at_least_one_character() {
        let mut rng = rand::rng();
        assert_eq!(generate_name(&mut rng, 0).len(), 1);
        assert_eq!(generate_name(&mut rng, 1).len(), 1);
    }

    #[test]
    fn keeps_free_candidate() {
        assert_eq!(unique_name(Some("abc".to_owned()), |_| false), "abc");
    }

    #[test]
    fn regenerates_longer_name_on_collision() {
        let taken = HashSet::from_iter(["abc".to_owned()]);
        let name = unique_name(Some("abc".to_owned()), |name| taken.contains(name));
        assert_eq!(name.len(), 4);
        assert!(name.chars().next().unwrap().is_ascii_alphabetic());
    }

    #[test]
    fn keeps_growing_until_free() {
        let name = unique_name(Some("ab".to_owned()), |name| name.len() < 5);
        assert_eq!(name.len(), 5);
    }

    #[test]
    fn rejects_names_that_break_paths() {
        assert_matches::assert_matches!(validate_name("abc"), Ok(()));
        assert_matches::assert_matches!(validate_name(""), Err(_));
        assert_matches::assert_matches!(validate_name("#1"), Err(_));
        assert_matches::assert_matches!(validate_name("a.b"), Err(_));
        assert_matches::assert_matches!(validate_name("a b"), Err(_));
    }
}
