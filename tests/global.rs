use tuff::{InterpretResult, Vm};

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
fn test_def() {
    let source = r#"
var boring_car;
var sports_car = "mcLaren F1";

print(boring_car);
print(sports_car);
"#;
    assert_eq!(
        r#"nil
mcLaren F1"#,
        run(source).trim()
    );
}

#[test]
fn test_get_set() {
    let source = r#"
var my_car;
var sports_car = "mcLaren F1";
my_car = sports_car;

print(my_car);
print(sports_car);
"#;
    assert_eq!(
        r#"mcLaren F1
mcLaren F1"#,
        run(source).trim()
    );
}

#[test]
fn test_late_bound() {
    let source = r#"
fun my_car() {
   return sports_car;
}
var sports_car = "mcLaren F1";

print(my_car());
"#;
    assert_eq!(r#"mcLaren F1"#, run(source).trim());
}

#[test]
fn test_shadowing() {
    let source = r#"
var a = "global";
{
  var a = "local";
  print(a);
}
print(a);
"#;
    assert_eq!("local\nglobal", run(source).trim());
}

#[test]
fn test_set_undefined_leaves_no_residue() {
    let mut out = Vec::new();
    let mut err = Vec::new();
    {
        let mut vm = Vm::new(&mut out, &mut err);
        assert_eq!(InterpretResult::RuntimeError, vm.interpret("ghost = 1;"));
        // the failed set must not have defined the global as a side effect
        assert_eq!(InterpretResult::RuntimeError, vm.interpret("print(ghost);"));
    }
    let err_output = String::from_utf8(err).unwrap();
    assert_eq!(
        2,
        err_output
            .lines()
            .filter(|line| line.contains("Undefined variable 'ghost'."))
            .count()
    );
}

#[test]
fn test_globals_persist_across_interprets() {
    let mut out = Vec::new();
    let mut err = Vec::new();
    {
        let mut vm = Vm::new(&mut out, &mut err);
        assert_eq!(InterpretResult::Ok, vm.interpret("var stash = 21;"));
        assert_eq!(InterpretResult::Ok, vm.interpret("print(stash * 2);"));
    }
    assert_eq!("42", String::from_utf8(out).unwrap().trim());
}
