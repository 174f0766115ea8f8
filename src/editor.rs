//! Request orchestration: try the remote provider, fall back to simulation.

use crate::error::{ErrorEnvelope, Result};
use crate::image::{EditProvider, EditRequest, EditSource, EditedImage};
use crate::simulate::{SimulationOptions, Simulator};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Advisory status updates emitted while an edit runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Progress {
    /// A remote provider is processing the request.
    Submitting {
        /// Provider in use.
        provider: EditSource,
    },
    /// The remote path failed; a local simulation follows.
    FallingBack {
        /// Why the remote path failed.
        reason: ErrorEnvelope,
    },
    /// The local simulator is rendering.
    Simulating,
    /// The edit finished.
    Done {
        /// Where the result came from.
        source: EditSource,
    },
}

/// Result of [`Editor::edit`].
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// The edited image.
    pub image: EditedImage,
    /// Set when the remote path failed and the image is simulated.
    pub fallback: Option<ErrorEnvelope>,
}

impl EditOutcome {
    /// Whether the image was produced locally.
    pub fn is_simulated(&self) -> bool {
        self.image.source == EditSource::Simulated
    }
}

/// Runs edits against an optional provider with a local fallback.
#[derive(Clone, Default)]
pub struct Editor {
    provider: Option<Arc<dyn EditProvider>>,
    simulator: Simulator,
    progress: Option<UnboundedSender<Progress>>,
}

impl Editor {
    /// Creates an editor with no remote provider.
    pub fn new(options: SimulationOptions) -> Self {
        Self {
            provider: None,
            simulator: Simulator::new(options),
            progress: None,
        }
    }

    /// Sets the remote provider.
    pub fn with_provider(mut self, provider: Arc<dyn EditProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replaces the simulator.
    pub fn with_simulator(mut self, simulator: Simulator) -> Self {
        self.simulator = simulator;
        self
    }

    /// Sends progress notices to `sender`.
    pub fn with_progress(mut self, sender: UnboundedSender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Returns the configured provider, if any.
    pub fn provider(&self) -> Option<&Arc<dyn EditProvider>> {
        self.provider.as_ref()
    }

    /// Edits the image, falling back to simulation on any remote failure.
    ///
    /// Only a simulator failure (an undecodable source image) is returned as an
    /// error.
    pub async fn edit(&self, request: &EditRequest) -> Result<EditOutcome> {
        let provider = match (&self.provider, request.credential()) {
            (Some(provider), Some(_)) => provider,
            (provider, _) => {
                tracing::info!(
                    has_provider = provider.is_some(),
                    "no provider credential, simulating edit"
                );
                return self.simulate(request, None).await;
            }
        };

        self.notify(Progress::Submitting {
            provider: provider.kind(),
        });

        match provider.edit(request).await {
            Ok(image) => {
                tracing::info!(
                    provider = provider.name(),
                    job_id = image.metadata.job_id.as_deref().unwrap_or("-"),
                    bytes = image.size(),
                    "remote edit complete"
                );
                self.notify(Progress::Done {
                    source: image.source,
                });
                Ok(EditOutcome {
                    image,
                    fallback: None,
                })
            }
            Err(e) => {
                let reason = e.envelope();
                tracing::warn!(
                    provider = provider.name(),
                    kind = %reason.kind,
                    "remote edit failed, falling back to simulation: {e}"
                );
                self.notify(Progress::FallingBack {
                    reason: reason.clone(),
                });
                self.simulate(request, Some(reason)).await
            }
        }
    }

    async fn simulate(
        &self,
        request: &EditRequest,
        fallback: Option<ErrorEnvelope>,
    ) -> Result<EditOutcome> {
        self.notify(Progress::Simulating);

        let mut edit = self
            .simulator
            .simulate(request.source_image(), request.instruction())
            .await?;
        edit.image.metadata.fallback = fallback.clone();

        tracing::debug!(effects = ?edit.report.effects, "simulation complete");
        self.notify(Progress::Done {
            source: EditSource::Simulated,
        });

        Ok(EditOutcome {
            image: edit.image,
            fallback,
        })
    }

    fn notify(&self, progress: Progress) {
        if let Some(tx) = &self.progress {
            // Receiver gone: nobody is listening, carry on.
            let _ = tx.send(progress);
        }
    }
}
