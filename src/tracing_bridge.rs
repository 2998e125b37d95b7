//! Bridge from `tracing` spans to Micromegas thread-local spans.
//!
//! With the `trace` feature, Bevy emits a `tracing` span for every schedule
//! run and every system execution. This layer forwards the ones it is asked
//! for as Micromegas named scopes, so the pursuit tick shows up in the trace
//! timeline next to the schedule that ran it.

use micromegas_tracing::dispatch::{on_begin_named_scope, on_end_named_scope};
use micromegas_tracing::intern_string::intern_string;
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

// All bridged spans share a single static source location.
micromegas_tracing::static_span_location!(BRIDGE_LOCATION);

/// Bevy's span name for schedule runs.
const SCHEDULE_SPAN: &str = "schedule";
/// Bevy's span name for system runs.
const SYSTEM_SPAN: &str = "system";

/// Interned label stored in a bridged span's extensions.
struct BridgedSpan {
    name: &'static str,
}

/// Extracts the `name` field of a span.
#[derive(Default)]
struct NameVisitor {
    name: Option<String>,
}

impl Visit for NameVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "name" {
            self.name = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "name" && self.name.is_none() {
            self.name = Some(format!("{:?}", value));
        }
    }
}

/// `tracing_subscriber::Layer` forwarding Bevy schedule spans, and optionally
/// per-system spans, to Micromegas.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicromegasBridgeLayer {
    systems: bool,
}

impl MicromegasBridgeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also bridge one scope per system run. Noisy, but shows exactly where a
    /// slow fixed tick spends its time.
    pub fn with_systems(mut self) -> Self {
        self.systems = true;
        self
    }

    fn bridges(&self, span_name: &str) -> bool {
        span_name == SCHEDULE_SPAN || (self.systems && span_name == SYSTEM_SPAN)
    }
}

impl<S> Layer<S> for MicromegasBridgeLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !self.bridges(attrs.metadata().name()) {
            return;
        }

        let mut visitor = NameVisitor::default();
        attrs.record(&mut visitor);
        let label = visitor
            .name
            .unwrap_or_else(|| attrs.metadata().name().to_string());

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(BridgedSpan {
                name: intern_string(&label),
            });
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(data) = span.extensions().get::<BridgedSpan>()
        {
            on_begin_named_scope(&BRIDGE_LOCATION, data.name);
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(data) = span.extensions().get::<BridgedSpan>()
        {
            on_end_named_scope(&BRIDGE_LOCATION, data.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_spans_are_always_bridged() {
        let layer = MicromegasBridgeLayer::new();
        assert!(layer.bridges("schedule"));
        assert!(!layer.bridges("system"));
        assert!(!layer.bridges("other"));
    }

    #[test]
    fn system_spans_are_opt_in() {
        let layer = MicromegasBridgeLayer::new().with_systems();
        assert!(layer.bridges("schedule"));
        assert!(layer.bridges("system"));
    }
}
