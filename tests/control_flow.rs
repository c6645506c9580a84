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
fn test_if_else() {
    let source = r#"
if (1 < 2) {
  print("then");
} else {
  print("else");
}
if (nil) {
  print("then");
} else {
  print("else");
}
if (false) print("skipped");
"#;
    assert_eq!("then\nelse", run(source).trim());
}

#[test]
fn test_while() {
    let source = r#"
var i = 0;
var sum = 0;
while (i < 5) {
  i = i + 1;
  sum = sum + i;
}
print(sum);
"#;
    assert_eq!("15", run(source).trim());
}

#[test]
fn test_for() {
    let source = r#"
var sum = 0;
for (var i = 0; i < 5; i = i + 1) {
  sum = sum + i;
}
print(sum);
"#;
    assert_eq!("10", run(source).trim());
}

#[test]
fn test_for_without_increment() {
    let source = r#"
var i = 0;
for (; i < 3;) {
  i = i + 1;
}
print(i);
"#;
    assert_eq!("3", run(source).trim());
}

#[test]
fn test_for_expression_initializer() {
    let source = r#"
var i;
var count = 0;
for (i = 10; i > 7; i = i - 1) {
  count = count + 1;
}
print(count);
"#;
    assert_eq!("3", run(source).trim());
}

#[test]
fn test_nested_loops() {
    let source = r#"
var total = 0;
for (var i = 0; i < 3; i = i + 1) {
  for (var j = 0; j < 3; j = j + 1) {
    total = total + 1;
  }
}
print(total);
"#;
    assert_eq!("9", run(source).trim());
}

#[test]
fn test_and_short_circuit() {
    let source = r#"
print(true and "yes");
print(false and "yes");
print(nil and "unreached");
var touched = false;
fun touch() { touched = true; return true; }
var ignored = false and touch();
print(touched);
"#;
    assert_eq!("yes\nfalse\nnil\nfalse", run(source).trim());
}

#[test]
fn test_or_short_circuit() {
    let source = r#"
print(nil or "fallback");
print(1 or 2);
var touched = false;
fun touch() { touched = true; return true; }
var ignored = "set" or touch();
print(touched);
"#;
    assert_eq!("fallback\n1\nfalse", run(source).trim());
}

#[test]
fn test_recursion() {
    let source = r#"
fun fib(n) {
  if (n < 2) return n;
  return fib(n - 1) + fib(n - 2);
}
print(fib(10));
"#;
    assert_eq!("55", run(source).trim());
}

#[test]
fn test_early_return() {
    let source = r#"
fun pick(flag) {
  if (flag) {
    return "early";
  }
  return "late";
}
print(pick(true));
print(pick(false));
"#;
    assert_eq!("early\nlate", run(source).trim());
}

#[test]
fn test_implicit_return_is_nil() {
    let source = r#"
fun nothing() {}
print(nothing());
"#;
    assert_eq!("nil", run(source).trim());
}
