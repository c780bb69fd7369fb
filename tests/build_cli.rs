use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::process::Command;

use flate2::read::GzDecoder;
use tempfile::tempdir;

const BLANK_22: &str = "CHR\tBP\tSNP\tCM\n\
22\t16050075\trs587697622\t0.0\n\
22\t16050115\trs587755077\t0.0\n\
22\t16052080\trs587654921\t0.0\n\
22\t17000000\trs1000\t1.2\n";

const ANNOTATIONS_BED: &str = "chr22\t16050000\t16050100\tCoding\n\
chr22\t16052000\t16052100\tCoding\n\
chr22\t16999999\t17000000\tConserved\n\
chr21\t0\t100000000\tChr21Only\n";

fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(File::open(path).expect("open annot.gz"))
        .read_to_string(&mut text)
        .expect("decode annot.gz");
    text
}

fn indicator_column(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .map(|line| line.rsplit('\t').next().unwrap().to_string())
        .collect()
}

fn write_inputs(dir: &Path) {
    fs::write(dir.join("blank.22.annot.gz"), BLANK_22).expect("write blank annot");
    fs::write(dir.join("annotations.bed"), ANNOTATIONS_BED).expect("write bed");
}

fn ldsc2() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ldsc2"));
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn build_without_ldsc_writes_annotation_files() {
    let tmp = tempdir().expect("temporary directory");
    write_inputs(tmp.path());

    let status = ldsc2()
        .current_dir(tmp.path())
        .args([
            "build",
            "blank",
            "annotations.bed",
            "results/base",
            "--skip-to-chr",
            "22",
            "--processes",
            "2",
            "--no-ldsc",
        ])
        .status()
        .expect("run ldsc2 cli");
    assert!(status.success(), "CLI exited with status {status:?}");

    let coding = read_gz(&tmp.path().join("results/base.Coding.22.annot.gz"));
    assert!(coding.starts_with("CHR\tBP\tSNP\tCM\tANNOT\n"));
    assert_eq!(indicator_column(&coding), vec!["1", "0", "1", "0"]);

    let conserved = read_gz(&tmp.path().join("results/base.Conserved.22.annot.gz"));
    assert_eq!(indicator_column(&conserved), vec!["0", "0", "0", "1"]);

    assert!(!tmp.path().join("results/base.Chr21Only.22.annot.gz").exists());
}

#[cfg(unix)]
#[test]
fn build_runs_ldsc_once_per_annotation() {
    let tmp = tempdir().expect("temporary directory");
    write_inputs(tmp.path());
    let script = tmp.path().join("fake_ldsc.sh");
    fs::write(&script, "printf '%s\\n' \"$*\" >> \"$LDSC_LOG\"\n").expect("write script");
    let log = tmp.path().join("ldsc.log");

    let output = ldsc2()
        .current_dir(tmp.path())
        .env("LDSC_LOG", &log)
        .args([
            "build",
            "blank",
            "annotations.bed",
            "out",
            "--skip-to-chr",
            "22",
            "--plink-prefix",
            "ref/1000G.EUR.QC",
            "--snp-prefix",
            "ref/hm3",
            "--python",
            "sh",
            "--ldsc-script",
        ])
        .arg(&script)
        .output()
        .expect("run ldsc2 cli");
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let calls = fs::read_to_string(&log).expect("ldsc log");
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(
        calls,
        vec![
            "--l2 --bfile ref/1000G.EUR.QC.22 --ld-wind-cm 1 --annot out.Coding.22.annot.gz --out out.Coding.22 --print-snps ref/hm3.22.snp",
            "--l2 --bfile ref/1000G.EUR.QC.22 --ld-wind-cm 1 --annot out.Conserved.22.annot.gz --out out.Conserved.22 --print-snps ref/hm3.22.snp",
        ]
    );
}

#[cfg(unix)]
#[test]
fn failing_ldsc_fails_the_build() {
    let tmp = tempdir().expect("temporary directory");
    write_inputs(tmp.path());
    let script = tmp.path().join("broken_ldsc.sh");
    fs::write(&script, "exit 2\n").expect("write script");

    let output = ldsc2()
        .current_dir(tmp.path())
        .args(["build", "blank", "annotations.bed", "out", "--skip-to-chr", "22"])
        .args(["--python", "sh", "--ldsc-script"])
        .arg(&script)
        .output()
        .expect("run ldsc2 cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: ldsc exited"), "stderr: {stderr}");
}

#[test]
fn more_than_sixteen_processes_is_refused() {
    let tmp = tempdir().expect("temporary directory");
    write_inputs(tmp.path());

    let output = ldsc2()
        .current_dir(tmp.path())
        .args([
            "build",
            "blank",
            "annotations.bed",
            "out",
            "--processes",
            "17",
            "--no-ldsc",
        ])
        .output()
        .expect("run ldsc2 cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("17 processes, really?"), "stderr: {stderr}");
    assert!(!tmp.path().join("out.Coding.22.annot.gz").exists());
}

#[test]
fn env_reports_layout_from_variables() {
    let output = ldsc2()
        .env("LDSC2_DIR", "/srv/ldsc2")
        .env("LDSC2_PLINKFILES", "/panels/eur")
        .env_remove("LDSC2_LDSC_DIR")
        .args(["env"])
        .output()
        .expect("run ldsc2 cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dir = \"/srv/ldsc2\""), "stdout: {stdout}");
    assert!(stdout.contains("ldsc_dir = \"/srv/ldsc2/ldsc\""), "stdout: {stdout}");
    assert!(stdout.contains("plinkfiles = \"/panels/eur\""), "stdout: {stdout}");
}
