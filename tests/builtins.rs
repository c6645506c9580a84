use tuff::InterpretResult;

fn run(source: &str) -> String {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = tuff::interpret(source, &mut out, &mut err);
    assert_eq!(
        InterpretResult::Ok,
        result,
        "stderr: {}",
        String::from_utf8(err).unwrap()
    );
    String::from_utf8(out).unwrap()
}

#[test]
fn test_clock_returns_a_number() {
    assert_eq!("true", run("print(clock() > 0);").trim());
}

#[test]
fn test_clock_is_monotonic_enough() {
    assert_eq!("true", run("var a = clock(); var b = clock(); print(b >= a);").trim());
}

#[test]
fn test_print_appends_newline() {
    assert_eq!("hello\n", run(r#"print("hello");"#));
}

#[test]
fn test_print_returns_nil() {
    assert_eq!("inner\nnil", run(r#"print(print("inner"));"#).trim());
}

#[test]
fn test_print_single_value_rendering() {
    let source = r#"
print(1.5);
print(true);
print(nil);
"#;
    assert_eq!("1.5\ntrue\nnil", run(source).trim());
}

#[test]
fn test_print_format_positional() {
    assert_eq!(
        "x = 1, y = two",
        run(r#"print("x = {}, y = {}", 1, "two");"#).trim()
    );
}

#[test]
fn test_print_format_indexed() {
    assert_eq!("b-a", run(r#"print("{1}-{0}", "a", "b");"#).trim());
}

#[test]
fn test_print_format_escaped_braces() {
    assert_eq!("{braces}", run(r#"print("{{braces}}", 1);"#).trim());
}

#[test]
fn test_print_non_string_first_arg_ignores_rest() {
    assert_eq!("1", run("print(1, 2, 3);").trim());
}

#[test]
fn test_print_format_argument_out_of_range() {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = tuff::interpret(r#"print("{5}", 1);"#, &mut out, &mut err);
    assert_eq!(InterpretResult::RuntimeError, result);
    let err = String::from_utf8(err).unwrap();
    assert!(err.contains("Format argument 5 out of range."), "{}", err);
    assert!(err.contains("in script"), "{}", err);
}
