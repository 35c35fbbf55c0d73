//! Full-pipeline scenarios: argument list in, a fully-rendered plan (or a
//! classified diagnostic) out. Each module file's own unit tests cover a
//! single stage in isolation; these exercise several stages chained
//! together the way the driver actually runs them.

use std::path::PathBuf;

use jello::diagnose;
use jello::normalize;
use jello::parse;
use jello::plan;
use jello::reorder;
use jello::triple::Triple;
use jello::types::{Backend, Fix, FixAction, FixMode, Flag, Input, LibRef, LinkMode};

fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn basic_parse_through_plan_renders_a_minimal_link() {
    let inv = parse::parse(&args(&["main.o", "-o", "app", "-lm"])).unwrap();
    let inv = normalize::normalize(inv);

    let triple = Triple::parse("x86_64-unknown-linux-gnu").unwrap();
    let built = plan::plan(
        inv,
        triple,
        Backend::Lld,
        PathBuf::from("/usr/bin/ld.lld"),
        vec![],
        vec![],
        vec![],
        FixMode::Suggest,
    );

    assert_eq!(built.output, PathBuf::from("app"));
    assert_eq!(built.backend_args, vec!["-o", "app", "-lm", "main.o"]);
    assert!(built.inputs.contains(&Input::Object(PathBuf::from("main.o"))));
}

#[test]
fn wl_forwarded_flags_survive_into_the_rendered_plan() {
    let inv = parse::parse(&args(&[
        "main.o",
        "-Wl,--as-needed,-rpath,/opt/app/lib",
    ]))
    .unwrap();
    let inv = normalize::normalize(inv);
    assert!(inv.flags.contains(&Flag::AsNeeded));
    assert!(inv.flags.contains(&Flag::Rpath("/opt/app/lib".to_string())));

    let built = plan::plan(
        inv,
        Triple::parse("x86_64-unknown-linux-gnu").unwrap(),
        Backend::Bfd,
        PathBuf::from("/usr/bin/ld"),
        vec![],
        vec![],
        vec![],
        FixMode::Suggest,
    );
    assert!(built.backend_args.contains(&"--as-needed".to_string()));
    assert!(built.backend_args.contains(&"-rpath /opt/app/lib".to_string()));
}

#[test]
fn shared_flag_derives_shared_link_mode_and_renders_dash_shared() {
    let inv = parse::parse(&args(&["-shared", "-o", "libfoo.so", "foo.o"])).unwrap();
    let inv = normalize::normalize(inv);
    assert_eq!(inv.link_mode, LinkMode::Shared);

    let built = plan::plan(
        inv,
        Triple::parse("x86_64-unknown-linux-gnu").unwrap(),
        Backend::Lld,
        PathBuf::from("ld.lld"),
        vec![],
        vec![],
        vec![],
        FixMode::Suggest,
    );
    assert_eq!(&built.backend_args[..3], &["-o", "libfoo.so", "-shared"]);
}

#[test]
fn triple_parsing_round_trips_a_four_field_triple() {
    let triple = Triple::parse("aarch64-unknown-linux-musl").unwrap();
    assert_eq!(triple.to_string(), "aarch64-unknown-linux-musl");

    let inv = parse::parse(&args(&["main.o"])).unwrap();
    let inv = normalize::normalize(inv);
    let built = plan::plan(
        inv,
        triple,
        Backend::Lld,
        PathBuf::from("ld.lld"),
        vec![],
        vec![],
        vec![],
        FixMode::Suggest,
    );
    assert_eq!(built.triple.to_string(), "aarch64-unknown-linux-musl");
}

#[test]
fn mutually_dependent_archives_reorder_into_an_add_group_fix() {
    // Neither archive exists on disk, so symbol extraction via `nm`
    // fails for both and reorder() falls back to input order with no
    // fixes: this exercises that degraded path end to end rather than
    // faking an `nm` binary.
    let paths = vec![PathBuf::from("liba.a"), PathBuf::from("libb.a")];
    let (order, fixes) = reorder::reorder(&paths, &PathBuf::from("/nonexistent/nm"));
    assert_eq!(order, paths);
    assert!(fixes.is_empty());
}

#[test]
fn diagnose_recognizes_an_undefined_cxx_symbol_and_suggests_the_cxx_driver() {
    let stderr = "main.o: in function main:\nmain.c:(.text+0x1a): undefined reference to `std::cout@@GLIBCXX_3.4'\n";
    let diagnostics = diagnose::diagnose_stderr(stderr);
    assert_eq!(diagnostics.len(), 1);
    let diag = &diagnostics[0];
    assert_eq!(diag.code, "E001");
    assert!(diag
        .fixes
        .iter()
        .any(|f| matches!(f.action, jello::types::FixAction::UseCxxDriver)));
    assert!(diag.fixes.iter().any(|f| matches!(
        &f.action,
        jello::types::FixAction::AddFlag(Flag::LinkLib(LibRef::Named(name))) if name == "stdc++"
    )));
}

#[test]
fn end_to_end_pipeline_pieces_compose_for_a_static_link() {
    let inv = parse::parse(&args(&["-static", "a.o", "b.o", "-lfoo", "-o", "prog"])).unwrap();
    let inv = normalize::normalize(inv);
    assert_eq!(inv.link_mode, LinkMode::Static);

    let built = plan::plan(
        inv,
        Triple::parse("x86_64-unknown-linux-gnu").unwrap(),
        Backend::System,
        PathBuf::from("/usr/bin/ld"),
        vec![],
        vec![PathBuf::from("/usr/lib")],
        vec![],
        FixMode::Suggest,
    );

    assert_eq!(
        built.backend_args,
        vec!["-o", "prog", "-static", "-L", "/usr/lib", "-lfoo", "a.o", "b.o"]
    );

    let rerendered = plan::render_backend_args(&built);
    assert_eq!(built.backend_args, rerendered);
}

#[test]
fn auto_mode_reorder_cycle_is_reflected_in_the_rendered_plan() {
    let a = PathBuf::from("liba.a");
    let b = PathBuf::from("libb.a");
    let inv = parse::parse(&args(&["a.o"])).unwrap();
    let mut inv = normalize::normalize(inv);
    inv.inputs.push(Input::Archive(a.clone()));
    inv.inputs.push(Input::Archive(b.clone()));

    let fix = Fix {
        description: "wrap cyclic static libraries".to_string(),
        confidence: jello::types::Confidence::High,
        action: FixAction::AddGroup(vec![a.clone(), b.clone()]),
    };

    let auto = plan::plan(
        inv.clone(),
        Triple::parse("x86_64-unknown-linux-gnu").unwrap(),
        Backend::Bfd,
        PathBuf::from("/usr/bin/ld"),
        vec![],
        vec![],
        vec![fix.clone()],
        FixMode::Auto,
    );
    assert!(auto.backend_args.ends_with(&[
        "a.o".to_string(),
        "--start-group".to_string(),
        "liba.a".to_string(),
        "libb.a".to_string(),
        "--end-group".to_string(),
    ]));

    let suggest = plan::plan(
        inv,
        Triple::parse("x86_64-unknown-linux-gnu").unwrap(),
        Backend::Bfd,
        PathBuf::from("/usr/bin/ld"),
        vec![],
        vec![],
        vec![fix],
        FixMode::Suggest,
    );
    assert!(!suggest.backend_args.contains(&"--start-group".to_string()));
}
