//! The concrete scenarios and invariants exercised against a full
//! `Program`, one file per scenario group rather than per-module units.

use bsc_analysis::diagnostics::codes;
use bsc_analysis::{FileReference, PkgPath, Program};
use bsc_parser::ast::ParseMode;
use bsc_parser::{Position, SourceRange};
use pretty_assertions::assert_eq;
use unindent::unindent;

fn add_program(files: &[(&str, &str)]) -> Program {
    let mut program = Program::new();
    for (path, source) in files {
        program.add_code_file(*path, *path, source, ParseMode::Superset);
    }
    program
}

#[test]
fn child_descriptor_re_importing_parent_script_is_flagged() {
    let mut program = add_program(&[("util.brs", "function helper()\nend function\n")]);
    program.add_descriptor_file(
        "Parent.xml",
        "Parent.xml",
        "Parent",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("util.brs"), file_path_range: SourceRange::ZERO }],
    );
    let child_import_range = SourceRange::new(Position::new(5, 0), Position::new(5, 20));
    program.add_descriptor_file(
        "Child.xml",
        "Child.xml",
        "Child",
        SourceRange::ZERO,
        Some("Parent".to_string()),
        Some(SourceRange::new(Position::new(0, 0), Position::new(0, 6))),
        vec![FileReference { pkg_path: PkgPath::new("util.brs"), file_path_range: child_import_range }],
    );

    let diags = program.get_diagnostics("Child.xml");
    let dup = diags.iter().find(|d| d.code == codes::DUPLICATE_ANCESTOR_SCRIPT_IMPORT).expect("duplicate ancestor import diagnostic");
    assert_eq!(dup.range, child_import_range);
    assert!(dup.message.contains("Parent"));
}

#[test]
fn overriding_ancestor_function_emits_info_not_error() {
    let mut program = add_program(&[
        ("parent.brs", "function greet()\nend function\n"),
        ("child.brs", "function greet()\nend function\n"),
    ]);
    program.add_descriptor_file(
        "Parent.xml",
        "Parent.xml",
        "Parent",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("parent.brs"), file_path_range: SourceRange::ZERO }],
    );
    program.add_descriptor_file(
        "Child.xml",
        "Child.xml",
        "Child",
        SourceRange::ZERO,
        Some("Parent".to_string()),
        Some(SourceRange::new(Position::new(0, 0), Position::new(0, 6))),
        vec![FileReference { pkg_path: PkgPath::new("child.brs"), file_path_range: SourceRange::ZERO }],
    );

    let diags = program.get_diagnostics("child.brs");
    assert!(diags.iter().any(|d| d.code == codes::OVERRIDES_ANCESTOR_FUNCTION));
    assert!(!diags.iter().any(|d| d.severity == bsc_parser::Severity::Error));
}

#[test]
fn overriding_init_emits_no_info_diagnostic() {
    let mut program = add_program(&[
        ("parent.brs", "function init()\nend function\n"),
        ("child.brs", "function init()\nend function\n"),
    ]);
    program.add_descriptor_file(
        "Parent.xml",
        "Parent.xml",
        "Parent",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("parent.brs"), file_path_range: SourceRange::ZERO }],
    );
    program.add_descriptor_file(
        "Child.xml",
        "Child.xml",
        "Child",
        SourceRange::ZERO,
        Some("Parent".to_string()),
        Some(SourceRange::new(Position::new(0, 0), Position::new(0, 6))),
        vec![FileReference { pkg_path: PkgPath::new("child.brs"), file_path_range: SourceRange::ZERO }],
    );

    let diags = program.get_diagnostics("child.brs");
    assert!(!diags.iter().any(|d| d.code == codes::OVERRIDES_ANCESTOR_FUNCTION));
}

#[test]
fn argument_count_mismatch_reports_range_bound() {
    let source = unindent(
        "
        function greet(a, b, c = 1)
        end function
        sub main()
          greet(1)
        end sub
        ",
    );
    let mut program = add_program(&[("main.brs", &source)]);
    program.add_descriptor_file(
        "Main.xml",
        "Main.xml",
        "Main",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("main.brs"), file_path_range: SourceRange::ZERO }],
    );
    let diags = program.get_diagnostics("main.brs");
    let mismatch = diags.iter().find(|d| d.code == codes::MISMATCH_ARGUMENT_COUNT).expect("arg count mismatch diagnostic");
    assert!(mismatch.message.contains("2-3"));
    assert!(mismatch.message.contains("got 1"));
}

#[test]
fn add_then_remove_is_diagnostic_equivalent_to_never_adding() {
    let mut program = Program::new();
    let baseline = program.get_diagnostics("main.brs");
    program.add_code_file("main.brs", "main.brs", "sub main()\n  doThing()\nend sub\n", ParseMode::Superset);
    program.remove_file("main.brs");
    assert_eq!(program.get_diagnostics("main.brs"), baseline);
}

#[test]
fn add_order_does_not_affect_final_diagnostics() {
    let files = [
        ("base.brs", "function helper()\nend function\n"),
        ("child.brs", "sub run()\n  helper()\nend sub\n"),
    ];

    let mut forward = Program::new();
    for (path, src) in &files {
        forward.add_code_file(*path, *path, src, ParseMode::Superset);
    }
    forward.add_descriptor_file(
        "Base.xml",
        "Base.xml",
        "Base",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("base.brs"), file_path_range: SourceRange::ZERO }],
    );
    forward.add_descriptor_file(
        "Child.xml",
        "Child.xml",
        "Child",
        SourceRange::ZERO,
        Some("Base".to_string()),
        Some(SourceRange::new(Position::new(0, 0), Position::new(0, 4))),
        vec![FileReference { pkg_path: PkgPath::new("child.brs"), file_path_range: SourceRange::ZERO }],
    );

    let mut reversed = Program::new();
    for (path, src) in files.iter().rev() {
        reversed.add_code_file(*path, *path, src, ParseMode::Superset);
    }
    reversed.add_descriptor_file(
        "Child.xml",
        "Child.xml",
        "Child",
        SourceRange::ZERO,
        Some("Base".to_string()),
        Some(SourceRange::new(Position::new(0, 0), Position::new(0, 4))),
        vec![FileReference { pkg_path: PkgPath::new("child.brs"), file_path_range: SourceRange::ZERO }],
    );
    reversed.add_descriptor_file(
        "Base.xml",
        "Base.xml",
        "Base",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("base.brs"), file_path_range: SourceRange::ZERO }],
    );

    assert_eq!(forward.get_diagnostics("child.brs"), reversed.get_diagnostics("child.brs"));
    assert_eq!(forward.get_diagnostics("base.brs"), reversed.get_diagnostics("base.brs"));
}

#[test]
fn config_overrides_and_ignores_apply_to_program_diagnostics() {
    use bsc_analysis::config::Config;

    let mut program = add_program(&[("main.brs", "sub main()\n  doThing()\nend sub\n")]);
    program.add_descriptor_file(
        "Main.xml",
        "Main.xml",
        "Main",
        SourceRange::ZERO,
        None,
        None,
        vec![FileReference { pkg_path: PkgPath::new("main.brs"), file_path_range: SourceRange::ZERO }],
    );
    let mut config = Config::default();
    config.ignore_error_codes.push(codes::CALL_TO_UNKNOWN_FUNCTION);
    let filtered = config.apply(program.get_diagnostics("main.brs"));
    assert!(!filtered.iter().any(|d| d.code == codes::CALL_TO_UNKNOWN_FUNCTION));
}
