//! Integration tests driving `run_pipeline` end to end over the concrete
//! scenarios from SPEC_FULL.md/spec.md §8, exercising lex -> parse -> the
//! four semantic passes as one library consumer rather than a CLI subprocess.

use mamba_sema::limits::CompilerLimits;
use mamba_sema::run_pipeline;
use mamba_sema::semantic::errors::SemanticError;

fn analyze(source: &str) -> mamba_sema::Pipeline {
    let limits = CompilerLimits::default();
    run_pipeline(source, &limits).expect("lex/parse should succeed")
}

#[test]
fn generic_identity_yields_one_solution() {
    let source = "func identity[ T ] { x: T } -> { y: T } = { y = $.x }";
    let pipeline = analyze(source);
    assert!(pipeline.result.errors.is_empty());
    assert_eq!(pipeline.result.solutions.len(), 1);
    assert!(pipeline.result.solutions[0].is_ok());
}

#[test]
fn overload_disjunction_collapses_to_int_choice() {
    let source = "func f _ -> Int = 1 + 2";
    let pipeline = analyze(source);
    assert!(pipeline.result.errors.is_empty());
    assert_eq!(pipeline.result.solutions.len(), 1);
    assert!(pipeline.result.solutions[0].is_ok());
}

#[test]
fn mismatched_operand_types_report_unification_error() {
    let source = "func g _ -> Float = 1 + 2.0";
    let mut pipeline = analyze(source);
    let ok_count = pipeline.result.solutions.iter().filter(|s| s.is_ok()).count();
    let err_count = pipeline.result.solutions.iter().filter(|s| s.is_err()).count();
    assert_eq!(ok_count, 0, "Int/Float operands never conform to + overloads");
    assert!(err_count >= 1);
    for solution in pipeline.result.solutions.drain(..) {
        match solution {
            Err(SemanticError::UnificationError { .. }) => {}
            other => panic!("expected a UnificationError branch, got {:?}", other),
        }
    }
}

#[test]
fn generic_struct_property_access_resolves_through_specialization() {
    let source = "type Pair[ A, B ] = { first: A, second: B }\n\
                  func pick { p: Pair[ A = Int, B = String ] } -> String = $.p.second";
    let pipeline = analyze(source);
    assert!(pipeline.result.errors.is_empty(), "{:?}", pipeline.result.errors);
    assert_eq!(pipeline.result.solutions.len(), 1);
    assert!(pipeline.result.solutions[0].is_ok());
}

#[test]
fn unbound_identifier_is_reported_but_inference_still_proceeds() {
    let source = "func h _ -> Int = unknown";
    let pipeline = analyze(source);
    assert!(pipeline
        .result
        .errors
        .iter()
        .any(|e| matches!(e, SemanticError::UnboundName { name, .. } if name == "unknown")));
    assert!(!pipeline.result.solutions.is_empty());
}

#[test]
fn print_call_conforms_string_argument_to_object_domain() {
    let source = "func main _ -> Object = print { item = \"hi\" }";
    let pipeline = analyze(source);
    assert!(pipeline.result.errors.is_empty(), "{:?}", pipeline.result.errors);
    assert_eq!(pipeline.result.solutions.len(), 1);
    assert!(pipeline.result.solutions[0].is_ok());
}

#[test]
fn duplicate_function_overloads_are_permitted_but_duplicate_types_are_not() {
    let source = "type Pair = { x: Int }\n\
                  type Pair = { y: Int }\n\
                  func f _ -> Int = 1";
    let pipeline = analyze(source);
    assert!(pipeline
        .result
        .errors
        .iter()
        .any(|e| matches!(e, SemanticError::DuplicateDeclaration { name, .. } if name == "Pair")));
}

#[test]
fn two_overloads_of_same_function_name_are_both_kept() {
    let source = "func f _ -> Int = 1\n\
                  func f _ -> Int = 2";
    let pipeline = analyze(source);
    assert!(pipeline
        .result
        .errors
        .iter()
        .all(|e| !matches!(e, SemanticError::DuplicateDeclaration { .. })));
}

#[test]
fn empty_source_reports_frontend_empty_error() {
    let limits = CompilerLimits::default();
    let err = run_pipeline("", &limits).expect_err("empty module must fail the frontend");
    assert!(matches!(err, mamba_sema::FrontendError::Empty));
}

#[test]
fn malformed_source_reports_a_parse_error() {
    let limits = CompilerLimits::default();
    let err = run_pipeline("func", &limits).expect_err("truncated declaration must not parse");
    assert!(matches!(err, mamba_sema::FrontendError::Parse(_)));
}
