use crate::level::Level;
use crate::logger::Logger;
use crate::value::{Attr, Value};
use tracing::field::{Field, Visit};
use tracing::span;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that routes `tracing` events through a
/// [`Logger`], so code instrumented with `tracing` macros reaches the same
/// backends as code holding a `Logger` directly.
///
/// Each enclosing span becomes a group named after the span, holding the
/// span's own fields. An event inside `request > db` therefore logs its
/// fields at `request.db.<field>`.
pub struct BackendLayer {
    logger: Logger,
    with_target: bool,
}

impl BackendLayer {
    pub fn new(logger: Logger) -> Self {
        BackendLayer { logger, with_target: false }
    }

    /// Also record the event's target as a top-level `target` attribute.
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }
}

/// Fields recorded on a span, kept in the span's extensions.
struct SpanAttrs(Vec<Attr>);

impl<S> Layer<S> for BackendLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanAttrs(visitor.into_attrs()));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanAttrs>() {
            Some(existing) => existing.0.extend(visitor.into_attrs()),
            None => extensions.insert(SpanAttrs(visitor.into_attrs())),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(*meta.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut logger = if self.with_target {
            self.logger.with_attrs([Attr::string("target", meta.target())])
        } else {
            self.logger.clone()
        };

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                logger = logger.with_group(span.name());
                if let Some(fields) = span.extensions().get::<SpanAttrs>() {
                    logger = logger.with_attrs(fields.0.iter().cloned());
                }
            }
        }

        let message = visitor.message.take().unwrap_or_default();
        logger.log(level, message, &visitor.attrs);
    }
}

/// Collects `tracing` fields as typed [`Attr`]s. The `message` field is
/// split out; anything only available through `Debug` becomes a string.
#[derive(Default)]
pub struct FieldVisitor {
    pub attrs: Vec<Attr>,
    pub message: Option<String>,
}

impl FieldVisitor {
    /// Fields as attributes, with a recorded `message` kept as one.
    fn into_attrs(mut self) -> Vec<Attr> {
        if let Some(message) = self.message.take() {
            self.attrs.push(Attr::string("message", message));
        }
        self.attrs
    }

    fn push(&mut self, field: &Field, value: Value) {
        self.attrs.push(Attr::new(field.name(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, Value::String(format!("{:?}", value)));
        }
    }
}
