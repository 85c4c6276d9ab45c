use crate::accounts::{AccountStore, SigningCredential};
use crate::commands::Command;
use crate::commit::CommitExecutor;
use crate::config::LotteryConfig;
use crate::error::{FailureKind, LotteryError};
use crate::flow::WorkflowState;
use crate::gate::{prompt_options, ConfirmationGate, Decision};
use crate::ledger::LedgerClient;
use crate::locks::ActorLocks;
use crate::preflight::PreflightValidator;
use crate::render;
use crate::request::{WorkflowKind, WorkflowRequest};
use crate::snapshot::LedgerReader;
use crate::surface::{InteractionSurface, Presentation};
use crate::types::{ActorId, ChainAddress, PromptId, RequestId};
use crate::workflows::{workflow_for, Completion, LotteryWorkflow, WorkflowContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Immediate answer to a slash-command invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandReply {
    /// A confirmation prompt is waiting on the actor.
    Prompted {
        request_id: RequestId,
        prompt_id: PromptId,
        presentation: Presentation,
    },
    /// Intent capture failed; nothing was parked.
    Rejected {
        request_id: RequestId,
        failure: FailureKind,
        message: String,
    },
}

/// Terminal result of a workflow after a button response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub request_id: RequestId,
    pub kind: WorkflowKind,
    pub state: WorkflowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub presentation: Presentation,
}

/// Drives the confirm-then-commit workflows over injected collaborators.
pub struct LotteryEngine {
    config: LotteryConfig,
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerClient>,
    surface: Arc<dyn InteractionSurface>,
    reader: LedgerReader,
    validator: PreflightValidator,
    executor: CommitExecutor,
    gate: ConfirmationGate,
    locks: ActorLocks,
}

impl LotteryEngine {
    pub fn new(
        config: LotteryConfig,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerClient>,
        surface: Arc<dyn InteractionSurface>,
    ) -> Self {
        let reader = LedgerReader::new(Arc::clone(&ledger));
        let validator = PreflightValidator::new(&config, Arc::clone(&accounts), reader.clone());
        let executor = CommitExecutor::new(Arc::clone(&ledger), config.confirmation_timeout);
        Self {
            config,
            accounts,
            ledger,
            surface,
            reader,
            validator,
            executor,
            gate: ConfirmationGate::new(),
            locks: ActorLocks::new(),
        }
    }

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn accounts_backend(&self) -> &'static str {
        self.accounts.backend()
    }

    pub fn ledger_network(&self) -> &str {
        self.ledger.network()
    }

    pub fn pending_prompts(&self) -> usize {
        self.gate.pending()
    }

    /// Intent capture: validate, then park the request behind a confirmation prompt.
    pub async fn invoke(
        &self,
        actor: &ActorId,
        command: Command,
    ) -> Result<CommandReply, LotteryError> {
        let workflow = workflow_for(command.workflow_kind());
        let request = WorkflowRequest::new(actor.clone(), workflow.kind());
        let request_id = request.id();
        info!(
            actor = %actor,
            request_id = %request_id,
            command = command.name(),
            "command invoked"
        );

        let prompt = match self.capture(actor, workflow.as_ref()).await {
            Ok(prompt) => prompt,
            Err(err) => {
                let presentation = render::failure(&err, workflow.capture_activity());
                if err.is_rejection() {
                    warn!(
                        actor = %actor,
                        request_id = %request_id,
                        reason = %err,
                        "command rejected"
                    );
                } else {
                    warn!(
                        actor = %actor,
                        request_id = %request_id,
                        error = %err,
                        "intent capture failed"
                    );
                }
                let message = presentation.content.clone();
                self.show(actor, request_id, presentation).await;
                return Ok(CommandReply::Rejected {
                    request_id,
                    failure: err.kind(),
                    message,
                });
            }
        };

        let prompt_id = self.gate.open(request)?;
        let presentation = prompt.with_options(prompt_options(workflow.kind(), prompt_id));

        if let Err(err) = self
            .surface
            .present_prompt(actor, request_id, presentation.clone())
            .await
        {
            self.gate.withdraw(prompt_id)?;
            warn!(
                actor = %actor,
                request_id = %request_id,
                error = %err,
                "prompt could not be presented"
            );
            return Err(err);
        }

        info!(
            actor = %actor,
            request_id = %request_id,
            prompt_id = %prompt_id,
            state = WorkflowState::AwaitingConfirmation.name(),
            "awaiting confirmation"
        );
        Ok(CommandReply::Prompted {
            request_id,
            prompt_id,
            presentation,
        })
    }

    /// Resume a parked workflow with the button token the actor pressed.
    ///
    /// Gate misuse (unknown, foreign or malformed tokens) is returned as an error; every other
    /// failure ends the workflow and is reported in the outcome.
    pub async fn respond(
        &self,
        actor: &ActorId,
        token: &str,
    ) -> Result<WorkflowOutcome, LotteryError> {
        let consumed = self.gate.consume(actor, token)?;
        let mut request = consumed.request;
        let workflow = workflow_for(request.kind());

        if let Err(err) = self.surface.disable_options(actor, request.id()).await {
            warn!(
                actor = %actor,
                request_id = %request.id(),
                error = %err,
                "failed to disable prompt options"
            );
        }

        match consumed.decision {
            Decision::Cancel => {
                request.cancel()?;
                let presentation = workflow.cancelled();
                self.show(actor, request.id(), presentation.clone()).await;
                info!(
                    actor = %actor,
                    request_id = %request.id(),
                    state = request.state().name(),
                    "workflow cancelled"
                );
                Ok(outcome(&request, None, presentation))
            }
            Decision::Confirm => {
                request.confirm()?;
                let placeholder = workflow
                    .processing()
                    .with_options(prompt_options(request.kind(), consumed.prompt_id))
                    .with_options_disabled();
                self.show(actor, request.id(), placeholder).await;
                self.commit(&mut request, workflow.as_ref()).await
            }
        }
    }

    /// Drop prompts nobody answered within `max_age`.
    pub fn sweep_expired(&self, max_age: Duration) -> Result<usize, LotteryError> {
        let dropped = self.gate.discard_expired(max_age)?;
        if !dropped.is_empty() {
            info!(count = dropped.len(), "expired prompts discarded");
        }
        Ok(dropped.len())
    }

    async fn capture(
        &self,
        actor: &ActorId,
        workflow: &dyn LotteryWorkflow,
    ) -> Result<Presentation, LotteryError> {
        let lottery = self.config.require_lottery_address()?;
        self.config.validate()?;
        let credential = self.validator.require_credential(actor).await?;
        let ctx = self.context(actor, lottery, &credential);
        workflow.prompt(&ctx).await
    }

    async fn commit(
        &self,
        request: &mut WorkflowRequest,
        workflow: &dyn LotteryWorkflow,
    ) -> Result<WorkflowOutcome, LotteryError> {
        let actor = request.actor().clone();

        let _lease = match self.locks.acquire(&actor) {
            Ok(lease) => lease,
            Err(err) => return self.fail(request, workflow, err).await,
        };

        let lottery = match self.config.require_lottery_address() {
            Ok(lottery) => lottery,
            Err(err) => return self.fail(request, workflow, err).await,
        };
        let credential = match self.validator.require_credential(&actor).await {
            Ok(credential) => credential,
            Err(err) => return self.fail(request, workflow, err).await,
        };
        let ctx = self.context(&actor, lottery, &credential);

        if let Err(err) = workflow.preflight(&ctx).await {
            return self.fail(request, workflow, err).await;
        }

        request.begin_execution()?;
        info!(
            actor = %actor,
            request_id = %request.id(),
            state = request.state().name(),
            "executing writes"
        );

        let completion = match self.run_writes(&ctx, workflow).await {
            Ok(completion) => completion,
            Err(err) => return self.fail(request, workflow, err).await,
        };

        if let Some(broadcast) = completion.broadcast {
            if let Err(err) = self.surface.broadcast_to_channel(broadcast).await {
                warn!(
                    actor = %actor,
                    request_id = %request.id(),
                    error = %err,
                    "channel broadcast failed"
                );
            }
        }

        request.succeed()?;
        self.show(&actor, request.id(), completion.presentation.clone()).await;
        info!(
            actor = %actor,
            request_id = %request.id(),
            state = request.state().name(),
            "workflow succeeded"
        );
        Ok(outcome(request, None, completion.presentation))
    }

    async fn run_writes(
        &self,
        ctx: &WorkflowContext<'_>,
        workflow: &dyn LotteryWorkflow,
    ) -> Result<Completion, LotteryError> {
        let steps = workflow.plan(ctx)?;
        let receipts = self.executor.execute(&steps, ctx.credential).await?;
        workflow.complete(ctx, &receipts).await
    }

    async fn fail(
        &self,
        request: &mut WorkflowRequest,
        workflow: &dyn LotteryWorkflow,
        err: LotteryError,
    ) -> Result<WorkflowOutcome, LotteryError> {
        let during = request.state().name();
        request.fail()?;
        if err.is_rejection() {
            warn!(
                actor = %request.actor(),
                request_id = %request.id(),
                during = during,
                reason = %err,
                "workflow rejected"
            );
        } else {
            warn!(
                actor = %request.actor(),
                request_id = %request.id(),
                during = during,
                error = %err,
                "workflow failed"
            );
        }

        let presentation = render::failure(&err, workflow.commit_activity());
        self.show(request.actor(), request.id(), presentation.clone()).await;
        Ok(outcome(request, Some(err.kind()), presentation))
    }

    /// Render to the actor. A surface failure here never changes the outcome.
    async fn show(&self, actor: &ActorId, interaction: RequestId, presentation: Presentation) {
        if let Err(err) = self
            .surface
            .update_presentation(actor, interaction, presentation)
            .await
        {
            warn!(
                actor = %actor,
                request_id = %interaction,
                error = %err,
                "failed to update presentation"
            );
        }
    }

    fn context<'a>(
        &'a self,
        actor: &'a ActorId,
        lottery: &'a ChainAddress,
        credential: &'a SigningCredential,
    ) -> WorkflowContext<'a> {
        WorkflowContext {
            actor,
            config: &self.config,
            lottery,
            credential,
            reader: &self.reader,
            validator: &self.validator,
        }
    }
}

fn outcome(
    request: &WorkflowRequest,
    failure: Option<FailureKind>,
    presentation: Presentation,
) -> WorkflowOutcome {
    WorkflowOutcome {
        request_id: request.id(),
        kind: request.kind(),
        state: request.state(),
        failure,
        presentation,
    }
}
