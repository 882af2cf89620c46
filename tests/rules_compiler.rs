use ftp_listing::{Columns, CompileError, ErrorCode, RuleSet};

fn columns() -> Columns {
    Columns::from_list(
        "name:name,ext:extension,size:size,date:date,time:time,user:text,count:number",
    )
    .unwrap()
}

fn compile(src: &str) -> Result<RuleSet, CompileError> {
    RuleSet::compile(src, &columns())
}

fn assert_error(src: &str, code: ErrorCode, offset: usize) {
    match compile(src) {
        Ok(rules) => panic!("{:?} compiled to {}", src, rules),
        Err(e) => {
            assert_eq!(e.code(), Some(code), "wrong code for {:?}: {}", src, e);
            assert_eq!(e.offset(), Some(offset), "wrong offset for {:?}: {}", src, e);
        }
    }
}

#[test]
fn compiles_a_realistic_rule_set() {
    let src = r#"
# header
* if(first_nonempty_line), skip_white_spaces(), word(), skip_white_spaces();

* word(<user>), white_spaces(), positive_number(<size>), white_spaces(),
  month_3(<date>), white_spaces(), day(<date>), white_spaces(),
  year_or_time(<date>, <time>), white_spaces(1),
  assign(<is_hidden>, next_char == "."), rest_of_line(<name>),
  if(<name> not_end_with ".tmp");
"#;
    let rules = compile(src).unwrap();
    assert_eq!(rules.rules().len(), 2);
    assert_eq!(rules.rules()[1].functions.len(), 13);
}

#[test]
fn compilation_is_deterministic() {
    let src = "* word(<user>), white_spaces(), rest_of_line(<name>);\n* skip_white_spaces();";
    assert_eq!(compile(src).unwrap(), compile(src).unwrap());
}

#[test]
fn display_lists_rules_and_functions() {
    let rules = compile("* skip_white_spaces();\n* white_spaces(2), all_to(\"x\");").unwrap();
    assert_eq!(
        rules.to_string(),
        "* skip_white_spaces();\n* white_spaces(2), all_to(\"x\");"
    );
}

#[test]
fn source_without_rules_is_rejected() {
    assert_error("", ErrorCode::EmptyRuleSet, 0);
    assert_error("  # only a comment\n", ErrorCode::EmptyRuleSet, 19);
}

#[test]
fn number_literals_cover_the_full_range() {
    let rules = compile("* number(<count>), if(<count> != -9223372036854775808);").unwrap();
    assert_eq!(
        rules.to_string(),
        "* number(<#6>), if(<#6> != -9223372036854775808);"
    );
    assert!(compile("* number(<count>), if(<count> == +9223372036854775807);").is_ok());
    assert_error(
        "* number(<count>), if(<count> == -9223372036854775809);",
        ErrorCode::InvalidNumber,
        33,
    );
    assert_error("* white_spaces(-);", ErrorCode::InvalidNumber, 15);
}

#[test]
fn names_are_case_insensitive() {
    assert!(compile("* Word(<USER>), REST_OF_LINE(<Name>), If(NEXT_CHAR == \"\");").is_ok());
}

#[test]
fn syntax_errors_carry_offsets() {
    assert_error("word(<name>);", ErrorCode::UnexpectedSymbol, 0);
    assert_error("* foo(<name>);", ErrorCode::UnknownFunction, 2);
    assert_error("* word(<name>)", ErrorCode::MissingRuleEnd, 14);
    assert_error("* word;", ErrorCode::MissingFunctionParams, 2);
    assert_error("* word(<name>),;", ErrorCode::FunctionExpected, 15);
    assert_error("* all_to(\"abc);", ErrorCode::MissingStringEnd, 9);
    assert_error("* all_to(\"a\\qb\");", ErrorCode::UnknownEscape, 11);
    assert_error("* word(<nope>);", ErrorCode::UnknownColumn, 8);
    assert_error("* word(<name);", ErrorCode::MissingColumnIdEnd, 12);
    assert_error("* word(<ext>);", ErrorCode::GenericColumn, 8);
    assert_error("* if(sideways);", ErrorCode::UnknownStateVar, 5);
    assert_error("* all(<name>, 3 4);", ErrorCode::UnexpectedSymbolOrOperator, 16);
    assert_error("* all(<name>,);", ErrorCode::ParameterExpected, 13);
    assert_error("* if(next_char ==);", ErrorCode::RightOperandExpected, 17);
}

#[test]
fn one_operator_per_parameter() {
    assert_error(
        "* if(next_char == \"a\" == \"b\");",
        ErrorCode::UnsupportedExpression,
        22,
    );
}

#[test]
fn signatures_are_checked() {
    // word() writes text, size holds a number
    assert_error("* word(<size>);", ErrorCode::BadParameters, 2);
    assert_error("* white_spaces(\"x\");", ErrorCode::BadParameters, 2);
    assert_error("* time(<date>);", ErrorCode::BadParameters, 2);
    assert_error(
        "* word(<user>), unix_link(<is_dir>, <user>, <user>);",
        ErrorCode::BadParameters,
        16,
    );
    assert_error(
        "* month_3(<date>, \"jan feb\");",
        ErrorCode::BadMonth3List,
        18,
    );
}

#[test]
fn operands_must_agree() {
    assert_error(
        "* word(<user>), if(<user> == 3);",
        ErrorCode::OperandTypeMismatch,
        19,
    );
    assert_error("* if(next_word in 3);", ErrorCode::OperandTypeMismatch, 5);
    assert!(compile("* number(<count>), if(<count> != 3);").is_ok());
}

#[test]
fn columns_must_be_written_before_they_are_read() {
    assert_error("* if(<user> eq \"x\");", ErrorCode::BadColumnUse, 5);
    assert_error(
        "* day(<date>), month(<date>), if(<date> == <date>);",
        ErrorCode::BadColumnUse,
        33,
    );
    // written columns are forgotten at the next rule
    assert_error(
        "* word(<user>);\n* if(<user> eq \"x\");",
        ErrorCode::BadColumnUse,
        21,
    );
    assert!(compile("* word(<user>), cut_white_spaces(<user>), rest_of_line(<name>);").is_ok());
}

#[test]
fn errors_render_with_source() {
    let err = compile("* foo();").unwrap_err();
    assert!(matches!(err, CompileError::Source(ref e) if e.source_text() == "* foo();"));
    assert_eq!(err.to_string(), "unknown function at offset 2");
    let CompileError::Source(e) = err else { unreachable!() };
    assert_eq!(e.span().offset(), 2);
    assert_eq!(e.span().len(), 3);
}
