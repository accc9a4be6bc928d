use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_foam-lookup-entry");

fn run(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(BIN)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env_remove("RUST_LOG")
        .spawn()
        .expect("spawn foam-lookup-entry");
    {
        // The tool may exit before reading stdin, so a broken pipe is fine here.
        let mut input = child.stdin.take().expect("stdin");
        let _ = input.write_all(stdin.unwrap_or("").as_bytes());
    }
    child.wait_with_output().expect("wait for foam-lookup-entry")
}

fn stdout(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).expect("utf-8 stdout")
}

fn stderr(output: &Output) -> &str {
    std::str::from_utf8(&output.stderr).expect("utf-8 stderr")
}

const NESTED: &str = "a { b { c 5; } }";

#[test]
fn nested_key_from_stdin() {
    let output = run(&["-key", "a.b.c"], Some(NESTED));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "5\n");
}

#[test]
fn missing_terminal_key() {
    let output = run(&["-key", "a.b.d"], Some(NESTED));
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stdout(&output), "");
    assert_eq!(stderr(&output).trim(), "Key d was not found in a.b dictionary.");
}

#[test]
fn missing_top_level_key() {
    let output = run(&["-key", "nope"], Some(NESTED));
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stdout(&output), "");
    assert_eq!(stderr(&output).trim(), "Key nope was not found.");
}

#[test]
fn missing_sub_dictionary() {
    let output = run(&["-key", "a.x.c"], Some(NESTED));
    assert_eq!(output.status.code(), Some(8));
    assert_eq!(stderr(&output).trim(), "x sub-dictionary was not found.");

    let output = run(&["-key", "a.b.c.d"], Some(NESTED));
    assert_eq!(output.status.code(), Some(8), "a value is not a sub-dictionary");
}

#[test]
fn missing_key_argument() {
    let output = run(&[], Some(NESTED));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Usage"));

    let output = run(&["-batch"], Some(NESTED));
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "");
    assert_eq!(stdout(&output), "");
}

#[test]
fn missing_dictionary_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing_file");
    let missing = missing.to_str().unwrap();

    let output = run(&["-dict", missing, "-key", "a"], None);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout(&output), "\n");
    assert_eq!(
        stderr(&output).trim(),
        format!("File: {} is not found.", missing)
    );

    let output = run(&["-dict", missing, "-key", "a", "-batch"], None);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout(&output), "\n");
    assert_eq!(stderr(&output), "");
}

#[test]
fn batch_mode_is_silent() {
    for key in ["a.b.d", "a.x.c"] {
        let output = run(&["-key", key, "-batch"], Some(NESTED));
        assert_ne!(output.status.code(), Some(0));
        assert_eq!(stdout(&output), "");
        assert_eq!(stderr(&output), "");
    }
}

#[test]
fn dictionary_file_lookups() {
    let dict = "test/fvSolution";
    assert!(Path::new(dict).exists());

    let output = run(&["-dict", dict, "-key", "PISO.nCorrectors"], None);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "2\n");

    let output = run(&["--dict", dict, "--key", "solvers.U.solver"], None);
    assert_eq!(stdout(&output), "smoothSolver\n", "pattern keyword matches");

    let output = run(&["-dict", dict, "-key", "solvers.pFinal.solver"], None);
    assert_eq!(stdout(&output), "PCG\n", "macro entries are expanded");

    let output = run(&["-dict", dict, "-key", "FoamFile.location"], None);
    assert_eq!(stdout(&output), "\"system\"\n");

    let output = run(&["-dict", dict, "-key", "PISO.missing"], None);
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(
        stderr(&output).trim(),
        "Key missing was not found in test/fvSolution.PISO dictionary."
    );

    let output = run(&["-dict", dict, "-key", "missing"], None);
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(
        stderr(&output).trim(),
        "Key missing was not found in test/fvSolution."
    );
}

#[test]
fn sub_dictionary_output_round_trips() {
    let output = run(&["-dict", "test/fvSolution", "-key", "solvers.p"], None);
    assert_eq!(output.status.code(), Some(0));
    let printed = stdout(&output).to_string();
    assert!(printed.starts_with("{\n    solver          PCG;\n"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p");
    fs::write(&path, &printed).unwrap();
    let path = path.to_str().unwrap();
    let output = run(&["-dict", path, "-key", "tolerance"], None);
    assert_eq!(stdout(&output), "1e-06\n");
    let output = run(&["-dict", path, "-key", "relTol"], None);
    assert_eq!(stdout(&output), "0.05\n");
}

#[test]
fn includes_and_variables() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("common"), "nu 1e-05;\nwall { type noSlip; }\n").unwrap();
    fs::write(
        dir.path().join("case"),
        "#include \"common\"\ntransport { viscosity $nu; }\nwalls { $wall; }\n",
    )
    .unwrap();
    let case = dir.path().join("case");
    let case = case.to_str().unwrap();

    let output = run(&["-dict", case, "-key", "transport.viscosity"], None);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "1e-05\n");

    let output = run(&["-dict", case, "-key", "walls.type"], None);
    assert_eq!(stdout(&output), "noSlip\n");
}

#[test]
fn unreadable_dictionary() {
    let output = run(&["-key", "a"], Some("a { b 1;"));
    assert_eq!(output.status.code(), Some(16));
    assert!(stderr(&output).contains("syntax error"));

    let output = run(&["-key", "a", "-batch"], Some("a $undefined;"));
    assert_eq!(output.status.code(), Some(16));
    assert_eq!(stderr(&output), "");
}
