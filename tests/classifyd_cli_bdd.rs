//! Behaviour tests for the `classifyd` CLI.

use assert_cmd::Command;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::process::Output;

#[derive(Default)]
struct CliContext {
    output: RefCell<Option<Output>>,
}

#[fixture]
fn cli_context() -> CliContext {
    CliContext::default()
}

#[given("the classifyd binary")]
fn given_binary(#[from(cli_context)] ctx: &CliContext) {
    let _ = ctx;
}

#[when("running with \"{args}\"")]
#[expect(
    clippy::needless_pass_by_value,
    reason = "BDD macro injects owned value"
)]
#[expect(clippy::expect_used, reason = "tests should fail loudly")]
fn when_running(args: String, #[from(cli_context)] ctx: &CliContext) {
    let output = Command::cargo_bin("classifyd")
        .unwrap_or_else(|e| panic!("failed to locate classifyd binary: {e}"))
        .args(args.split_whitespace())
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run classifyd");
    *ctx.output.borrow_mut() = Some(output);
}

#[then("it exits successfully")]
#[expect(clippy::expect_used, reason = "tests should fail loudly")]
fn then_success(#[from(cli_context)] ctx: &CliContext) {
    let binding = ctx.output.borrow();
    let output = binding.as_ref().expect("missing output");
    assert!(output.status.success(), "{output:?}");
    let health: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("health report on stdout");
    assert_eq!(health["status"], "healthy");
}

#[then("it exits with an error")]
#[expect(clippy::expect_used, reason = "tests should fail loudly")]
fn then_error(#[from(cli_context)] ctx: &CliContext) {
    let status = ctx.output.borrow().as_ref().expect("missing output").status;
    assert!(!status.success());
}

#[scenario(path = "tests/features/classifyd_cli.feature", index = 0)]
fn mock_preflight(cli_context: CliContext) {
    let _ = cli_context;
}

#[scenario(path = "tests/features/classifyd_cli.feature", index = 1)]
fn missing_model_preflight(cli_context: CliContext) {
    let _ = cli_context;
}

#[scenario(path = "tests/features/classifyd_cli.feature", index = 2)]
fn unknown_backend(cli_context: CliContext) {
    let _ = cli_context;
}
