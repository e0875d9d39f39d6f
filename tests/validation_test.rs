use cytogate::validation::*;

#[test]
fn test_is_valid_definition() {
    assert!(is_valid_definition("+", false).is_ok());
    assert!(is_valid_definition("-", false).is_ok());
    assert!(is_valid_definition("++", false).is_err());

    assert!(is_valid_definition("+-", true).is_ok());
    assert!(is_valid_definition("--", true).is_ok());
    assert!(is_valid_definition("-", true).is_err());
    assert!(is_valid_definition("+++", true).is_err());
    assert!(is_valid_definition("", true).is_err());
}

#[test]
fn test_is_valid_document_id() {
    assert!(is_valid_document_id("cd3_cd4").is_ok());
    assert!(is_valid_document_id("").is_err());
    assert!(is_valid_document_id("a/b").is_err());
    assert!(is_valid_document_id("..").is_err());
    assert!(is_valid_document_id("nul\0").is_err());
}

#[test]
fn test_is_not_empty() {
    assert!(is_not_empty("hello").is_ok());
    assert!(is_not_empty("").is_err());
    assert!(is_not_empty("   ").is_err());
}

#[test]
fn test_is_finite() {
    assert!(is_finite(&[0.0, -1.5, 1e9]).is_ok());
    assert!(is_finite(&[]).is_ok());
    assert!(is_finite(&[1.0, f64::NAN]).is_err());
    assert!(is_finite(&[f64::INFINITY]).is_err());
}
