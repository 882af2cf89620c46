use ftp_listing::autodetect::{compile, compile_with, CallKind};
use ftp_listing::search::{SearchError, SearchProvider, Searcher, SubstringSearcher};
use ftp_listing::{CompileError, Condition, ErrorCode};

fn eval(src: &str, welcome: &str, syst: &str) -> bool {
    compile(src).unwrap().evaluate(welcome, syst)
}

fn assert_error(src: &str, code: ErrorCode, offset: usize) -> CompileError {
    match compile(src) {
        Ok(c) => panic!("{:?} compiled to {}", src, c),
        Err(e) => {
            assert_eq!(e.code(), Some(code), "wrong code for {:?}: {}", src, e);
            assert_eq!(e.offset(), Some(offset), "wrong offset for {:?}: {}", src, e);
            e
        }
    }
}

#[test]
fn empty_condition_is_always_true() {
    assert!(matches!(compile("").unwrap(), Condition::AlwaysTrue));
    assert!(matches!(compile("  \n\t").unwrap(), Condition::AlwaysTrue));
    assert!(matches!(compile("syst_contains(\"\")").unwrap(), Condition::AlwaysTrue));
    assert!(eval("", "", ""));
}

#[test]
fn functions_read_their_own_input() {
    assert!(eval("syst_contains(\"unix\")", "", "215 UNIX Type: L8"));
    assert!(!eval("syst_contains(\"unix\")", "220 UNIX ready", ""));
    assert!(eval("welcome_contains(\"VxWorks\")", "220 VxWorks FTP", "215 UNIX"));
    assert!(eval("reg_exp_in_syst(\"^215 (unix|linux)\")", "", "215 Linux"));
    assert!(!eval("reg_exp_in_syst(\"^unix\")", "", "215 UNIX"));
    assert!(eval("reg_exp_in_welcome(\"ftp\\\\s+server\")", "220 FTP  Server ready", ""));
}

#[test]
fn boolean_operators() {
    let cases = [
        ("syst_contains(\"a\") and syst_contains(\"b\")", [false, false, false, true]),
        ("syst_contains(\"a\") or syst_contains(\"b\")", [false, true, true, true]),
        ("not syst_contains(\"a\") and syst_contains(\"b\")", [false, false, true, false]),
        ("not (syst_contains(\"a\") or syst_contains(\"b\"))", [true, false, false, false]),
    ];
    let inputs = ["", "a", "b", "ab"];
    for (src, expected) in cases {
        let c = compile(src).unwrap();
        for (syst, want) in inputs.iter().zip(expected) {
            assert_eq!(c.evaluate("", syst), want, "{} on {:?}", src, syst);
        }
    }
}

#[test]
fn and_binds_tighter_than_or() {
    let src = "syst_contains(\"a\") or syst_contains(\"b\") and syst_contains(\"c\")";
    assert!(eval(src, "", "a"));
    assert!(!eval(src, "", "b"));
    assert!(eval(src, "", "bc"));
    assert_eq!(
        compile("(syst_contains(\"a\") or syst_contains(\"b\")) and syst_contains(\"c\")")
            .unwrap()
            .to_string(),
        "(syst_contains(\"a\") or syst_contains(\"b\")) and syst_contains(\"c\")"
    );
}

#[test]
fn not_applies_to_the_next_term_only() {
    let c = compile("not syst_contains(\"a\") and syst_contains(\"b\")").unwrap();
    assert!(matches!(c, Condition::And(ref l, _) if matches!(**l, Condition::Not(_))));
    assert!(eval("not syst_contains(\"a\") and syst_contains(\"b\")", "", "b"));
    assert_error("not not syst_contains(\"a\")", ErrorCode::UnexpectedSymbol, 4);
}

#[test]
fn operators_group_to_the_left() {
    let c = compile("syst_contains(\"a\") and syst_contains(\"b\") and syst_contains(\"c\")").unwrap();
    assert!(matches!(c, Condition::And(ref l, ref r)
        if matches!(**l, Condition::And(..)) && matches!(**r, Condition::Call(_))));
}

#[test]
fn keywords_and_functions_ignore_case() {
    assert!(eval("NOT Syst_Contains(\"x\") AND WELCOME_CONTAINS(\"y\")", "Y", ""));
}

#[test]
fn syntax_errors_carry_offsets() {
    assert_error("foo(\"a\")", ErrorCode::UnknownFunction, 0);
    assert_error("syst_contains(\"a\") xor", ErrorCode::UnknownFunction, 19);
    assert_error("syst_contains \"a\"", ErrorCode::MissingFunctionParams, 14);
    assert_error("syst_contains(a)", ErrorCode::MissingStringParam, 14);
    assert_error("syst_contains(\"a\"", ErrorCode::MissingParenEnd, 17);
    assert_error("syst_contains(\"abc", ErrorCode::MissingStringEnd, 14);
    assert_error("(syst_contains(\"a\")", ErrorCode::MissingRightParen, 19);
    assert_error("syst_contains(\"a\") syst_contains(\"b\")", ErrorCode::UnexpectedSymbol, 19);
    assert_error("syst_contains(\"a\") and", ErrorCode::UnexpectedSymbol, 22);
    assert_error("syst_contains(\"a\") & x", ErrorCode::UnexpectedSymbol, 19);
    assert_error("syst_contains(\"a\\q\")", ErrorCode::UnknownEscape, 16);
    assert_error("syst_contains(\"a\") or (", ErrorCode::UnexpectedSymbol, 23);
}

#[test]
fn invalid_regex_reports_engine_detail() {
    let err = assert_error("reg_exp_in_syst(\"(unclosed\")", ErrorCode::InvalidRegex, 16);
    match err {
        CompileError::Source(e) => assert!(e.detail.is_some_and(|d| !d.is_empty())),
        CompileError::OutOfMemory => panic!("expected a source error"),
    }
}

#[test]
fn regex_falls_back_to_pcre2() {
    assert!(eval("reg_exp_in_welcome(\"Serv-U(?= FTP)\")", "220 Serv-U FTP Server", ""));
    assert!(!eval("reg_exp_in_welcome(\"Serv-U(?= FTP)\")", "220 Serv-U ready", ""));
}

/// Substring search only; every regex is rejected.
struct NoRegex;

impl SearchProvider for NoRegex {
    fn substring(&self, pattern: &str) -> Result<Box<dyn Searcher>, SearchError> {
        Ok(Box::new(SubstringSearcher::new(pattern)?))
    }

    fn regex(&self, pattern: &str) -> Result<Box<dyn Searcher>, SearchError> {
        Err(SearchError::Invalid(format!("regex disabled: {}", pattern)))
    }
}

#[test]
fn custom_search_provider() {
    let c = compile_with("welcome_contains(\"hello\")", &NoRegex).unwrap();
    assert!(c.evaluate("say HELLO", ""));

    let err = compile_with("reg_exp_in_syst(\"x\")", &NoRegex).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Source(ref e) if e.detail.as_deref() == Some("regex disabled: x")
    ));
}

#[test]
fn call_kinds_have_stable_names() {
    for kind in CallKind::ALL {
        assert_eq!(CallKind::from_name(kind.name()), Some(kind));
    }
    assert_eq!(CallKind::from_name("SYST_CONTAINS"), Some(CallKind::SystContains));
}
