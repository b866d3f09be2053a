//! Integration tests for sequential compensation ordering.

use std::sync::Mutex;

use async_trait::async_trait;
use digest_saga::{SagaBuilder, SagaStep, StepStatus, TransactionStatus};

#[derive(Default)]
struct TestContext {
    events: Mutex<Vec<String>>,
}

impl TestContext {
    fn push(&self, event: String) {
        self.events.lock().expect("events lock poisoned").push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock poisoned").clone()
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

struct TrackedStep {
    name: String,
    fail: bool,
}

impl TrackedStep {
    fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: true,
        }
    }
}

#[async_trait]
impl SagaStep for TrackedStep {
    type Input = Vec<String>;
    type Output = Vec<String>;
    type Context = TestContext;
    type Error = TestError;

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        ctx: &TestContext,
        mut input: Vec<String>,
    ) -> Result<Vec<String>, TestError> {
        ctx.push(format!("execute {}", self.name));
        if self.fail {
            return Err(TestError(format!("{} failed", self.name)));
        }
        input.push(self.name.clone());
        Ok(input)
    }

    async fn compensate(
        &self,
        ctx: &TestContext,
        output: Vec<String>,
        cause: &TestError,
    ) -> Result<(), TestError> {
        ctx.push(format!(
            "compensate {} with [{}] because {cause}",
            self.name,
            output.join(",")
        ));
        Ok(())
    }
}

fn build_saga(
    total: usize,
    failing: usize,
) -> digest_saga::Saga<Vec<String>, Vec<String>, TestContext, TestError> {
    let mut builder: SagaBuilder<Vec<String>, Vec<String>, TestContext, TestError> =
        SagaBuilder::new().named("ordered");
    for index in 1..=total {
        let name = format!("step{index}");
        let step = if index == failing {
            TrackedStep::failing(&name)
        } else {
            TrackedStep::ok(&name)
        };
        builder = builder.add_step(step);
    }
    builder.build()
}

#[tokio::test]
async fn second_of_three_steps_failing_compensates_only_the_first() {
    let ctx = TestContext::default();
    let saga = build_saga(3, 2);

    let (result, transaction) = saga.execute_with_transaction(&ctx, Vec::new()).await;

    let err = result.expect_err("step2 should fail");
    assert_eq!(err.step(), "step2");
    assert_eq!(err.source_error(), &TestError("step2 failed".to_string()));
    assert_eq!(transaction.completed_steps(), ["step1"]);
    assert_eq!(transaction.status(), TransactionStatus::Failed);
    assert_eq!(
        ctx.events(),
        vec![
            "execute step1",
            "execute step2",
            "compensate step1 with [step1] because step2 failed",
        ]
    );
}

#[tokio::test]
async fn completed_steps_are_a_prefix_and_compensated_in_reverse() {
    for failing in 1..=5 {
        let ctx = TestContext::default();
        let saga = build_saga(5, failing);

        let (result, transaction) = saga.execute_with_transaction(&ctx, Vec::new()).await;
        assert!(result.is_err());

        let expected_completed: Vec<String> =
            (1..failing).map(|index| format!("step{index}")).collect();
        assert_eq!(transaction.completed_steps(), expected_completed.as_slice());

        let compensated: Vec<String> = ctx
            .events()
            .into_iter()
            .filter_map(|event| {
                event
                    .strip_prefix("compensate ")
                    .and_then(|rest| rest.split(' ').next())
                    .map(ToString::to_string)
            })
            .collect();
        let mut expected_compensated = expected_completed.clone();
        expected_compensated.reverse();
        assert_eq!(compensated, expected_compensated, "failing step {failing}");
    }
}

#[tokio::test]
async fn later_steps_never_execute_after_failure() {
    let ctx = TestContext::default();
    let saga = build_saga(4, 2);

    let _ = saga.execute(&ctx, Vec::new()).await;

    assert!(!ctx.events().iter().any(|e| e.contains("step3")));
    assert!(!ctx.events().iter().any(|e| e.contains("step4")));
}

#[tokio::test]
async fn audit_log_marks_compensated_and_failed_steps() {
    let ctx = TestContext::default();
    let saga = build_saga(3, 3);

    let (_, transaction) = saga.execute_with_transaction(&ctx, Vec::new()).await;

    let statuses: Vec<_> = transaction
        .audit_log()
        .records()
        .iter()
        .map(|r| (r.name.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("step1", StepStatus::Compensated),
            ("step2", StepStatus::Compensated),
            ("step3", StepStatus::Failed),
        ]
    );
}
