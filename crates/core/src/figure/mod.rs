//! Headless frame loop.
//!
//! A [`Figure`] compiles its delegates once, then repeatedly hands a
//! [`Frame`] to the caller's update callback and draws. Everything the
//! callback pushes happens before that frame's draw.

use crate::{
    config::FigureConfig,
    controls::ControlPanel,
    render::{RenderBackend, RenderableHandle},
    scene::Delegate,
    Result,
};

/// What the update callback gets to work with for one frame.
pub struct Frame<'a> {
    pub index: u64,
    pub controls: &'a mut ControlPanel,
    pub backend: &'a mut dyn RenderBackend,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShowSummary {
    pub frames_drawn: u64,
    pub update_failures: u64,
    pub draw_failures: u64,
}

#[derive(Debug, Default, Clone)]
pub struct Figure {
    config: FigureConfig,
}

impl Figure {
    pub fn new(config: FigureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FigureConfig {
        &self.config
    }

    /// Compiles every delegate, failing before the first frame if any is
    /// rejected. Returns the handles in delegate order.
    pub fn compile(
        &self,
        backend: &mut dyn RenderBackend,
        delegates: &[Delegate],
    ) -> Result<Vec<RenderableHandle>> {
        delegates
            .iter()
            .map(|delegate| {
                let descriptor = delegate.descriptor();
                descriptor.validate()?;
                let instances = descriptor.instance_count()?;
                let handle = backend.compile(&descriptor)?;
                tracing::debug!(kind = ?descriptor.kind, instances, "compiled renderable");
                Ok(handle)
            })
            .collect()
    }

    /// Runs the configured number of frames. A failing callback or draw
    /// skips only that frame; previously pushed buffer contents stay in
    /// effect.
    pub fn show<F>(
        &self,
        backend: &mut dyn RenderBackend,
        delegates: &[Delegate],
        controls: &mut ControlPanel,
        mut update: F,
    ) -> Result<ShowSummary>
    where
        F: FnMut(&mut Frame<'_>) -> Result<()>,
    {
        let handles = self.compile(backend, delegates)?;
        let mut summary = ShowSummary::default();

        for index in 0..self.config.frames {
            let mut frame = Frame {
                index,
                controls: &mut *controls,
                backend: &mut *backend,
            };
            if let Err(err) = update(&mut frame) {
                tracing::warn!(
                    frame = index,
                    error = %err,
                    "update callback failed, skipping frame"
                );
                summary.update_failures += 1;
                continue;
            }
            match backend.draw(&handles, self.config.clear_color) {
                Ok(()) => summary.frames_drawn += 1,
                Err(err) => {
                    tracing::warn!(frame = index, error = %err, "draw failed");
                    summary.draw_failures += 1;
                }
            }
        }

        tracing::info!(
            frames = summary.frames_drawn,
            update_failures = summary.update_failures,
            draw_failures = summary.draw_failures,
            "figure closed"
        );
        Ok(summary)
    }
}
