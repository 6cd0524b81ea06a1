//! Process runner and full-run tests against real child processes.
//!
//! Small `sh` scripts stand in for both search jobs; they parse the same
//! flags the real jobs take and leave logs and Verilog where expected.
#![cfg(unix)]

use codesign_core::{
    JobRunner, JobSpec, Layout, ProcessRunner, RoundController, RoundPhase, RunConfig, RunStamp,
    RunStatus, StageKind,
};
use std::path::Path;
use std::sync::Arc;

const STAMP: &str = "2024-06-30-09-15-00";

const POLICY_JOB: &str = r#"
bits=""; key=""; template="none"
while [ $# -gt 0 ]; do
  case "$1" in
    --input_bit) bits="$2"; shift 2 ;;
    --strftime) key="$2"; shift 2 ;;
    --template) template="$2"; shift 2 ;;
    *) shift ;;
  esac
done
base="$(dirname "$0")"
echo "policy search $key"
echo "policy warning" >&2
echo "ppo $template" >> "$base/seen.txt"
mkdir -p "$base/run_verilog_mult_mid"
printf '// mult header\nmodule mult(x,y,p);\nendmodule\nmodule adder(a,b,s);\nendmodule\n' > "$base/run_verilog_mult_mid/ppo_$key.v"
printf 'ppo_%s.v\t3\t10\t3\t10\nppo_other.v\t5\t10\t5\t10\n' "$key" > "$base/mult_logs/mult_${bits}b_$key.log"
"#;

const TREE_JOB: &str = r#"
bits=""; key=""; template="none"; resume="fresh"
while [ $# -gt 0 ]; do
  case "$1" in
    --input_bit) bits="$2"; shift 2 ;;
    --strftime) key="$2"; shift 2 ;;
    --template) template="$2"; shift 2 ;;
    --init_state) resume="resume"; shift ;;
    *) shift ;;
  esac
done
base="$(dirname "$0")"
echo "tree search $key"
echo "mcts $template $resume" >> "$base/seen.txt"
mkdir -p "$base/run_verilog_mult_add_mid"
printf '// adder header\n// width 2\nmodule mult(x,y,p);\nendmodule\nmodule adder(a,b,s);\nendmodule\n' > "$base/run_verilog_mult_add_mid/mcts_$key.v"
printf 'mcts_%s.v\t1\t10\t1\t10\n' "$key" > "$base/mcts_mult_adder/mcts_mult_adder_${bits}b_openroad_$key.log"
"#;

fn write_jobs(base: &Path, policy: &str, tree: &str) -> RunConfig {
    std::fs::write(base.join("PPO2_mult.py"), policy).unwrap();
    std::fs::write(base.join("MCTS_mult.py"), tree).unwrap();
    RunConfig {
        base_dir: base.to_path_buf(),
        input_bit: 4,
        area_weight: 0.01,
        rounds: 2,
        interpreter: "sh".to_string(),
        ..RunConfig::default()
    }
}

fn controller(config: RunConfig) -> RoundController {
    RoundController::new(config, Arc::new(ProcessRunner::quiet()))
        .expect("valid config")
        .with_stamp(RunStamp::fixed(STAMP))
}

/// Test: stdout and stderr are both captured
#[tokio::test]
async fn test_combined_output_captured() {
    let runner = ProcessRunner::quiet();
    let result = runner
        .run_command(
            "sh",
            &[
                "-c".to_string(),
                "echo first; echo second >&2; echo third".to_string(),
            ],
        )
        .await
        .expect("execute failed");

    assert!(result.succeeded);
    for line in ["first", "second", "third"] {
        assert!(result.output.lines().any(|l| l == line), "missing {line}");
    }
    assert_eq!(result.output.lines().count(), 3);
}

/// Test: non-zero exit is reported, not raised
#[tokio::test]
async fn test_exit_status_reported() {
    let runner = ProcessRunner::quiet();
    let result = runner
        .run_command("sh", &["-c".to_string(), "echo partial; exit 3".to_string()])
        .await
        .expect("execute failed");

    assert!(!result.succeeded);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.output, "partial\n");
}

/// Test: invalid UTF-8 is replaced and the job still runs to completion
#[tokio::test]
async fn test_non_utf8_output_is_decoded_lossily() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let script = format!(
        "printf 'ok\\n\\377\\376 latin1\\n'; printf 'bad \\377\\n' >&2; sleep 0.2; echo done > '{}'; echo after",
        marker.display()
    );

    let result = ProcessRunner::quiet()
        .run_command("sh", &["-c".to_string(), script])
        .await
        .expect("execute failed");

    assert!(result.succeeded);
    assert!(marker.exists(), "job should have run to completion");
    let lines: Vec<&str> = result.output.lines().collect();
    assert!(lines.contains(&"ok"));
    assert!(lines.contains(&"\u{FFFD}\u{FFFD} latin1"));
    assert!(lines.contains(&"bad \u{FFFD}"));
    assert_eq!(lines.last(), Some(&"after"));
}

/// Test: the trait entry point runs the job's command line
#[tokio::test]
async fn test_job_runner_runs_job_command() {
    let job = JobSpec {
        stage: StageKind::PolicySearch,
        round: 0,
        round_key: "k-0".to_string(),
        command: vec!["echo".to_string(), "k-0".to_string()],
    };

    let result = ProcessRunner::quiet().run(&job).await.expect("execute failed");
    assert!(result.succeeded);
    assert_eq!(result.output, "k-0\n");
}

/// Test: two rounds against real job processes
#[tokio::test]
async fn test_full_run_with_shell_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_jobs(dir.path(), POLICY_JOB, TREE_JOB);
    let layout = Layout::from_config(&config);

    let outcome = controller(config).run().await.unwrap();
    assert!(outcome.is_done(), "status: {:?}", outcome.status);
    assert_eq!(outcome.rounds_completed(), 2);

    let seen = std::fs::read_to_string(dir.path().join("seen.txt")).unwrap();
    let seen: Vec<&str> = seen.lines().collect();
    assert_eq!(
        seen,
        vec![
            "ppo none".to_string(),
            format!("mcts mult_template_{STAMP}-0.v fresh"),
            format!("ppo adder_template_{STAMP}-0.v"),
            format!("mcts mult_template_{STAMP}-1.v resume"),
        ]
    );

    let journal = std::fs::read_to_string(&outcome.journal).unwrap();
    assert!(journal.contains(&format!("PPO\tppo_{STAMP}-0.v\t3\t10\t3\t10")));
    assert!(journal.contains(&format!("MCTS\tmcts_{STAMP}-1.v\t1\t10\t1\t10")));

    let adder = std::fs::read_to_string(
        layout
            .adder_template_dir()
            .join(format!("adder_template_{STAMP}-0.v")),
    )
    .unwrap();
    assert_eq!(adder, "// adder header\nmodule adder(a,b,s);\nendmodule\n");
}

/// Test: a job exiting non-zero ends the run with its output journaled
#[tokio::test]
async fn test_failing_job_process_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let failing = "echo 'synthesis crashed'; exit 1\n";
    let config = write_jobs(dir.path(), failing, TREE_JOB);
    let layout = Layout::from_config(&config);

    let outcome = controller(config).run().await.unwrap();
    match &outcome.status {
        RunStatus::Aborted { round, phase, .. } => {
            assert_eq!(*round, 0);
            assert_eq!(*phase, Some(RoundPhase::PolicySearchRun));
        }
        RunStatus::Done => panic!("run should abort"),
    }

    let journal = std::fs::read_to_string(&outcome.journal).unwrap();
    assert!(journal.contains("[ERROR] PPO2_mult.py failed during iteration 0."));
    assert!(journal.contains("synthesis crashed"));
    assert!(!dir.path().join("seen.txt").exists());
    assert_eq!(
        std::fs::read_dir(layout.mult_template_dir()).unwrap().count(),
        0
    );
}
