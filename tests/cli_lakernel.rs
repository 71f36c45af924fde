use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn command_invalid() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.arg("foobar");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("foobar"));

    Ok(())
}

#[test]
fn command_pair_viterbi() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("lakernel")?;
    let output = cmd
        .arg("pair")
        .arg("--params")
        .arg("tests/data/toy.params")
        .arg("--seq1")
        .arg("AABRS")
        .arg("--seq2")
        .arg("AABRT")
        .arg("--viterbi")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout, "3.00000\n");

    Ok(())
}

#[test]
fn command_matrix_viterbi() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("lakernel")?;
    let output = cmd
        .arg("matrix")
        .arg("--params")
        .arg("tests/data/toy.params")
        .arg("--sequences")
        .arg("tests/data/pair.fa")
        .arg("--viterbi")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout, "matrix\tx\ty\nx\t4.00\t3.00\ny\t3.00\t4.00\n");

    Ok(())
}

// The off-diagonal cell of a two-sequence matrix is the pair value.
#[test]
fn command_matrix_agrees_with_pair() -> anyhow::Result<()> {
    let pair = Command::cargo_bin("lakernel")?
        .args(&["pair", "--params", "tests/data/toy.params"])
        .args(&["--seq1", "AABRS", "--seq2", "AABRT"])
        .output()?;
    assert!(pair.status.success());
    let value: f64 = String::from_utf8(pair.stdout)?.trim().parse()?;
    assert!(value > 3.0);

    let matrix = Command::cargo_bin("lakernel")?
        .args(&["matrix", "--params", "tests/data/toy.params"])
        .args(&["--sequences", "tests/data/pair.fa", "--threads", "2"])
        .output()?;
    assert!(matrix.status.success());
    let stdout = String::from_utf8(matrix.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    let row: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(row[0], "x");
    assert_eq!(row[2], format!("{:.2}", value));

    Ok(())
}

#[test]
fn command_matrix_workers_and_backends() -> anyhow::Result<()> {
    let reference = Command::cargo_bin("lakernel")?
        .args(&["matrix", "--sequences", "tests/data/proteins.fa"])
        .output()?;
    assert!(reference.status.success());
    let reference = String::from_utf8(reference.stdout)?;
    assert_eq!(reference.lines().count(), 5);
    assert!(reference.starts_with("matrix\tsp|P69905|HBA_HU\t"));

    for backend in &["channel", "rayon"] {
        for threads in &["3", "20"] {
            let output = Command::cargo_bin("lakernel")?
                .args(&["matrix", "--sequences", "tests/data/proteins.fa"])
                .args(&["--backend", *backend, "--threads", *threads])
                .output()?;
            assert!(output.status.success());
            assert_eq!(String::from_utf8(output.stdout)?, reference);
        }
    }

    Ok(())
}

#[test]
fn command_empty_sequence() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.args(&["pair", "--seq1", "AABRS", "--seq2", "123"]);
    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("sequence load"));

    Ok(())
}

#[test]
fn command_matrix_empty_record() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("bad.fa");
    fs::write(&input, ">ok\nMKV\n>blank\n0123\n")?;

    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.arg("matrix").arg("--sequences").arg(&input);
    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("sequence load"))
        .stderr(predicate::str::contains("blank"));

    Ok(())
}

#[test]
fn command_truncated_params() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let params = temp.path().join("short.params");
    fs::write(&params, "5\n-1 5\n0.2 4 1\n")?;

    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.arg("pair")
        .arg("--params")
        .arg(&params)
        .args(&["--seq1", "MKV", "--seq2", "MKV"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("parameter load"))
        .stderr(predicate::str::contains("expected 213 values, found 6"));

    Ok(())
}

#[test]
fn command_missing_files() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.args(&["pair", "--params", "tests/data/no_such.params"])
        .args(&["--seq1", "MKV", "--seq2", "MKV"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("parameter load"));

    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.args(&["matrix", "--sequences", "tests/data/no_such.fa"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("sequence load"));

    Ok(())
}

#[test]
fn command_zero_workers() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("lakernel")?;
    cmd.args(&["matrix", "--sequences", "tests/data/pair.fa", "--threads", "0"]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("configuration"));

    Ok(())
}

#[test]
fn command_matrix_empty_corpus() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("empty.fa");
    fs::write(&input, "")?;

    let mut cmd = Command::cargo_bin("lakernel")?;
    let output = cmd.arg("matrix").arg("--sequences").arg(&input).output()?;

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout)?, "matrix\n");

    Ok(())
}
