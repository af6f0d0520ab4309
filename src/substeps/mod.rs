//! Per-section substep state machine.
//!
//! ```text
//! Hidden    (not applicable, or no fields)
//! Editing -> Review -> Editing (edit) -> Review -> order placed
//! ```
//!
//! The controller is the only place a [`SubstepState`] changes. Forward
//! navigation flushes the staged values to the session before the state
//! moves; a failed flush leaves the section in `Editing`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::CheckoutError;
use crate::render::{RenderError, RenderSink, SectionView};
use crate::schema::{
    validate_section, CartContext, FieldError, FieldSchemaProvider, FieldValue, SectionSchema,
    SectionValues, Settings,
};
use crate::session::{normalize, SessionStore};
use crate::summary::{Summary, SummaryRenderer};

/// Presentation state of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstepState {
    /// Not applicable; renders nothing and never touches the session
    Hidden,
    /// Live form
    Editing,
    /// Collapsed summary
    Review,
}

impl fmt::Display for SubstepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstepState::Hidden => write!(f, "hidden"),
            SubstepState::Editing => write!(f, "editing"),
            SubstepState::Review => write!(f, "review"),
        }
    }
}

#[derive(Debug, Clone)]
struct Substep {
    state: SubstepState,
    schema: SectionSchema,
    /// Values shown in the form, possibly ahead of the session
    staged: SectionValues,
    errors: Vec<FieldError>,
}

/// Drives the substeps of one checkout session
pub struct SubstepController {
    provider: Arc<dyn FieldSchemaProvider>,
    settings: Settings,
    cart: CartContext,
    session: SessionStore,
    summaries: SummaryRenderer,
    /// Opened sections in display order
    order: Vec<String>,
    substeps: BTreeMap<String, Substep>,
}

impl fmt::Debug for SubstepController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstepController")
            .field("session", &self.session)
            .field("sections", &self.order)
            .finish_non_exhaustive()
    }
}

impl SubstepController {
    pub fn new(
        provider: Arc<dyn FieldSchemaProvider>,
        settings: Settings,
        cart: CartContext,
        session: SessionStore,
    ) -> Self {
        let summaries = SummaryRenderer::from_settings(&settings);
        Self {
            provider,
            settings,
            cart,
            session,
            summaries,
            order: Vec::new(),
            substeps: BTreeMap::new(),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open every section in order
    pub async fn open_all(&mut self, sections: &[&str]) -> Result<(), CheckoutError> {
        for section in sections {
            self.open(section).await?;
        }
        Ok(())
    }

    /// Resolve a section and derive its initial state from the session
    #[instrument(skip(self), fields(session = %self.session.session_id()))]
    pub async fn open(&mut self, section: &str) -> Result<SubstepState, CheckoutError> {
        let schema = self.provider.resolve(section, &self.settings);

        if schema.is_empty() || !self.cart.applies_to(section) {
            debug!(section, "Section not applicable, hidden");
            self.insert(section, Substep {
                state: SubstepState::Hidden,
                schema,
                staged: SectionValues::new(),
                errors: Vec::new(),
            });
            return Ok(SubstepState::Hidden);
        }

        let stored = self.session.has_section(section).await?;
        let staged = self.session.get_resolved(&schema).await?;
        let populated = stored && staged.values().any(|v| !v.is_empty());

        let state = if populated && self.settings.layout().supports_collapsing() {
            SubstepState::Review
        } else {
            SubstepState::Editing
        };

        debug!(section, %state, "Opened section");
        self.insert(section, Substep {
            state,
            schema,
            staged,
            errors: Vec::new(),
        });
        Ok(state)
    }

    fn insert(&mut self, section: &str, substep: Substep) {
        if !self.substeps.contains_key(section) {
            self.order.push(section.to_string());
        }
        self.substeps.insert(section.to_string(), substep);
    }

    /// Apply new settings to every open section.
    ///
    /// Sections whose schema became empty are forced to `Hidden`. Staged
    /// values are carried over for fields that still exist, so nothing the
    /// customer typed is lost by a settings change.
    pub async fn refresh(&mut self, settings: Settings) -> Result<(), CheckoutError> {
        self.summaries = SummaryRenderer::from_settings(&settings);
        self.settings = settings;

        for section in self.order.clone() {
            let schema = self.provider.resolve(&section, &self.settings);
            let Some(substep) = self.substeps.get_mut(&section) else {
                continue;
            };

            if schema.is_empty() || !self.cart.applies_to(&section) {
                if substep.state != SubstepState::Hidden {
                    info!(section = %section, "Section lost its fields, forcing hidden");
                }
                substep.state = SubstepState::Hidden;
                substep.schema = schema;
                continue;
            }

            if substep.state == SubstepState::Hidden {
                self.open(&section).await?;
                continue;
            }

            let staged = std::mem::take(&mut substep.staged);
            substep.staged = normalize(&schema, staged);
            substep.schema = schema;
            if !self.settings.layout().supports_collapsing() {
                substep.state = SubstepState::Editing;
            }
        }
        Ok(())
    }

    pub fn state(&self, section: &str) -> Option<SubstepState> {
        self.substeps.get(section).map(|s| s.state)
    }

    /// Staged values of a section
    pub fn values(&self, section: &str) -> Option<&SectionValues> {
        self.substeps.get(section).map(|s| &s.staged)
    }

    pub fn schema(&self, section: &str) -> Option<&SectionSchema> {
        self.substeps.get(section).map(|s| &s.schema)
    }

    /// Validation errors from the last failed advance
    pub fn errors(&self, section: &str) -> &[FieldError] {
        self.substeps
            .get(section)
            .map(|s| s.errors.as_slice())
            .unwrap_or(&[])
    }

    /// Opened sections in display order
    pub fn sections(&self) -> impl Iterator<Item = (&str, SubstepState)> {
        self.order
            .iter()
            .filter_map(|key| self.substeps.get(key).map(|s| (key.as_str(), s.state)))
    }

    fn substep_mut(
        &mut self,
        section: &str,
        action: &'static str,
        allowed: &[SubstepState],
    ) -> Result<&mut Substep, CheckoutError> {
        let substep = self
            .substeps
            .get_mut(section)
            .ok_or_else(|| CheckoutError::SectionNotOpen(section.to_string()))?;
        if !allowed.contains(&substep.state) {
            return Err(CheckoutError::InvalidTransition {
                section: section.to_string(),
                action,
                state: substep.state.to_string(),
            });
        }
        Ok(substep)
    }

    /// Record a field change locally; nothing is persisted yet
    pub fn stage(
        &mut self,
        section: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), CheckoutError> {
        let substep = self.substep_mut(section, "stage", &[SubstepState::Editing])?;
        let Some(definition) = substep.schema.field(field) else {
            debug!(section, field, "Dropping change to a field absent from the schema");
            return Ok(());
        };
        let value = definition.kind.coerce(value);
        substep.staged.insert(field.to_string(), value);
        Ok(())
    }

    /// Stage several field changes at once
    pub fn stage_all(&mut self, section: &str, values: SectionValues) -> Result<(), CheckoutError> {
        for (field, value) in values {
            self.stage(section, &field, value)?;
        }
        Ok(())
    }

    /// Persist staged values without changing state
    pub async fn autosave(&mut self, section: &str) -> Result<(), CheckoutError> {
        self.substep_mut(section, "save", &[SubstepState::Editing])?;
        self.flush(section).await
    }

    async fn flush(&mut self, section: &str) -> Result<(), CheckoutError> {
        let Some(substep) = self.substeps.get(section) else {
            return Err(CheckoutError::SectionNotOpen(section.to_string()));
        };

        let stored = self
            .session
            .set(&substep.schema, substep.staged.clone())
            .await
            .map_err(|source| {
                warn!(section, "Section flush failed: {}", source);
                CheckoutError::SessionUnavailable {
                    section: section.to_string(),
                    source,
                }
            })?;

        if let Some(substep) = self.substeps.get_mut(section) {
            substep.staged = stored;
        }
        Ok(())
    }

    /// Validate, flush and collapse a section.
    ///
    /// Stays in `Editing` on validation errors or a failed flush. Layouts
    /// that cannot collapse stay in `Editing` after a successful flush.
    #[instrument(skip(self), fields(session = %self.session.session_id()))]
    pub async fn advance(&mut self, section: &str) -> Result<SubstepState, CheckoutError> {
        let substep = self.substep_mut(section, "advance", &[SubstepState::Editing])?;

        let errors = validate_section(&substep.schema, &substep.staged);
        if !errors.is_empty() {
            debug!(section, count = errors.len(), "Section has invalid fields");
            substep.errors = errors.clone();
            return Err(CheckoutError::Validation {
                section: section.to_string(),
                errors,
            });
        }
        substep.errors.clear();

        self.flush(section).await?;

        let next = if self.settings.layout().supports_collapsing() {
            SubstepState::Review
        } else {
            SubstepState::Editing
        };
        if let Some(substep) = self.substeps.get_mut(section) {
            substep.state = next;
        }
        debug!(section, state = %next, "Advanced section");
        Ok(next)
    }

    /// Reopen a collapsed section with its last-flushed values
    pub async fn edit(&mut self, section: &str) -> Result<(), CheckoutError> {
        let substep = self.substep_mut(
            section,
            "edit",
            &[SubstepState::Review, SubstepState::Editing],
        )?;
        if substep.state == SubstepState::Editing {
            return Ok(());
        }

        let schema = substep.schema.clone();
        let flushed = self.session.get_resolved(&schema).await?;
        if let Some(substep) = self.substeps.get_mut(section) {
            substep.staged = flushed;
            substep.state = SubstepState::Editing;
        }
        Ok(())
    }

    /// Summary of a section's staged values
    pub fn summary(&self, section: &str) -> Option<Summary> {
        let substep = self.substeps.get(section)?;
        if substep.state == SubstepState::Hidden {
            return None;
        }
        Some(self.summaries.render(&substep.schema, &substep.staged))
    }

    /// Write a section to the sink according to its state
    pub fn render(&self, section: &str, sink: &mut dyn RenderSink) -> Result<(), RenderError> {
        let Some(substep) = self.substeps.get(section) else {
            return Ok(());
        };

        match substep.state {
            SubstepState::Hidden => Ok(()),
            SubstepState::Editing => sink.write(&SectionView::form(
                &substep.schema,
                &substep.staged,
                &substep.errors,
            )),
            SubstepState::Review => {
                let summary = self.summaries.render(&substep.schema, &substep.staged);
                sink.write(&SectionView::summary(&substep.schema, summary, true))
            }
        }
    }

    /// Write every open section in display order
    pub fn render_all(&self, sink: &mut dyn RenderSink) -> Result<(), RenderError> {
        for section in &self.order {
            self.render(section, sink)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RecordingRenderSink, ViewBody};
    use crate::retry::RetryPolicy;
    use crate::schema::{BuiltinSchemaProvider, CheckoutLayout, FieldErrorKind};
    use crate::session::MemorySessionBackend;

    fn gift_settings() -> Settings {
        let mut settings = Settings::default();
        settings.gift_options.enabled = true;
        settings
    }

    fn controller(
        backend: &Arc<MemorySessionBackend>,
        settings: Settings,
        cart: CartContext,
    ) -> SubstepController {
        let session =
            SessionStore::new(backend.clone(), "sess").with_retry(RetryPolicy::immediate(1));
        SubstepController::new(Arc::new(BuiltinSchemaProvider::new()), settings, cart, session)
    }

    #[tokio::test]
    async fn test_disabled_gift_options_is_hidden_and_renders_nothing() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, Settings::default(), CartContext::default());

        assert_eq!(ctl.open("gift_options").await.unwrap(), SubstepState::Hidden);

        let mut sink = RecordingRenderSink::new();
        ctl.render("gift_options", &mut sink).unwrap();
        assert!(sink.views.is_empty());
        assert!(ctl.summary("gift_options").is_none());
    }

    #[tokio::test]
    async fn test_virtual_cart_hides_shipping() {
        let backend = Arc::new(MemorySessionBackend::new());
        let cart = CartContext {
            needs_shipping: false,
        };
        let mut ctl = controller(&backend, Settings::default(), cart);
        assert_eq!(ctl.open("shipping").await.unwrap(), SubstepState::Hidden);
        assert_eq!(ctl.open("billing").await.unwrap(), SubstepState::Editing);
    }

    #[tokio::test]
    async fn test_fresh_section_opens_editing() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        assert_eq!(ctl.open("gift_options").await.unwrap(), SubstepState::Editing);
    }

    #[tokio::test]
    async fn test_populated_section_opens_in_review() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_message", "Hi".into()).unwrap();
        ctl.advance("gift_options").await.unwrap();

        let mut reloaded = controller(&backend, gift_settings(), CartContext::default());
        assert_eq!(reloaded.open("gift_options").await.unwrap(), SubstepState::Review);

        let mut single = gift_settings();
        single.checkout.layout = CheckoutLayout::SingleStep;
        let mut single_ctl = controller(&backend, single, CartContext::default());
        assert_eq!(single_ctl.open("gift_options").await.unwrap(), SubstepState::Editing);
    }

    #[tokio::test]
    async fn test_advance_flushes_then_reviews() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_message", "  Happy birthday! ".into())
            .unwrap();

        assert_eq!(ctl.advance("gift_options").await.unwrap(), SubstepState::Review);
        let stored = ctl.session().get("gift_options").await.unwrap();
        assert_eq!(stored["gift_message"], FieldValue::text("Happy birthday!"));

        let mut sink = RecordingRenderSink::new();
        ctl.render("gift_options", &mut sink).unwrap();
        let ViewBody::Summary { summary } = &sink.views[0].body else {
            panic!("expected summary");
        };
        assert_eq!(summary.to_text(), "Happy birthday!");
    }

    #[tokio::test]
    async fn test_validation_failure_stays_editing() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, Settings::default(), CartContext::default());
        ctl.open("contact").await.unwrap();
        ctl.stage("contact", "email", "not-an-email".into()).unwrap();

        let err = ctl.advance("contact").await.unwrap_err();
        assert_eq!(err.field_errors()[0].kind, FieldErrorKind::InvalidEmail);
        assert_eq!(ctl.state("contact"), Some(SubstepState::Editing));
        assert_eq!(ctl.errors("contact").len(), 1);
        assert!(!ctl.session().has_section("contact").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_flush_stays_editing() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_message", "Hi".into()).unwrap();
        backend.fail_next_writes(5);

        let err = ctl.advance("gift_options").await.unwrap_err();
        assert!(matches!(err, CheckoutError::SessionUnavailable { .. }));
        assert!(!err.is_fatal());
        assert_eq!(ctl.state("gift_options"), Some(SubstepState::Editing));
        // Staged input survives for the next attempt
        assert_eq!(
            ctl.values("gift_options").unwrap()["gift_message"],
            FieldValue::text("Hi")
        );
    }

    #[tokio::test]
    async fn test_edit_reloads_last_flushed_values() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_message", "first".into()).unwrap();
        ctl.advance("gift_options").await.unwrap();

        // Another tab writes a newer value
        let schema = ctl.schema("gift_options").unwrap().clone();
        let mut newer = SectionValues::new();
        newer.insert("gift_message".to_string(), FieldValue::text("second"));
        ctl.session().set(&schema, newer).await.unwrap();

        ctl.edit("gift_options").await.unwrap();
        assert_eq!(ctl.state("gift_options"), Some(SubstepState::Editing));
        assert_eq!(
            ctl.values("gift_options").unwrap()["gift_message"],
            FieldValue::text("second")
        );
    }

    #[tokio::test]
    async fn test_transitions_rejected_in_wrong_state() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, Settings::default(), CartContext::default());
        ctl.open("gift_options").await.unwrap();

        assert!(matches!(
            ctl.stage("gift_options", "gift_message", "x".into()),
            Err(CheckoutError::InvalidTransition { .. })
        ));
        assert!(matches!(
            ctl.advance("order_notes").await,
            Err(CheckoutError::SectionNotOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_field_dropped_on_stage() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_wrap", "red".into()).unwrap();
        assert!(!ctl.values("gift_options").unwrap().contains_key("gift_wrap"));
    }

    #[tokio::test]
    async fn test_refresh_forces_hidden_when_fields_disappear() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_message", "Hi".into()).unwrap();
        ctl.advance("gift_options").await.unwrap();

        ctl.refresh(Settings::default()).await.unwrap();
        assert_eq!(ctl.state("gift_options"), Some(SubstepState::Hidden));

        let mut sink = RecordingRenderSink::new();
        ctl.render_all(&mut sink).unwrap();
        assert!(sink.views.is_empty());

        // Re-enabling brings the stored values back
        ctl.refresh(gift_settings()).await.unwrap();
        assert_eq!(ctl.state("gift_options"), Some(SubstepState::Review));
        assert_eq!(
            ctl.values("gift_options").unwrap()["gift_message"],
            FieldValue::text("Hi")
        );
    }

    #[tokio::test]
    async fn test_single_step_layout_never_collapses() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut settings = gift_settings();
        settings.checkout.layout = CheckoutLayout::SingleStep;
        let mut ctl = controller(&backend, settings, CartContext::default());
        ctl.open("gift_options").await.unwrap();

        assert_eq!(ctl.advance("gift_options").await.unwrap(), SubstepState::Editing);
        assert!(ctl.session().has_section("gift_options").await.unwrap());
    }

    #[tokio::test]
    async fn test_autosave_keeps_state() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open("gift_options").await.unwrap();
        ctl.stage("gift_options", "gift_from", "Ana".into()).unwrap();

        ctl.autosave("gift_options").await.unwrap();
        assert_eq!(ctl.state("gift_options"), Some(SubstepState::Editing));
        // A dangling "from" is kept in the session as typed
        let stored = ctl.session().get("gift_options").await.unwrap();
        assert_eq!(stored["gift_from"], FieldValue::text("Ana"));
    }

    #[tokio::test]
    async fn test_render_all_in_open_order() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut ctl = controller(&backend, gift_settings(), CartContext::default());
        ctl.open_all(&["contact", "gift_options", "order_notes"])
            .await
            .unwrap();

        let mut sink = RecordingRenderSink::new();
        ctl.render_all(&mut sink).unwrap();
        assert_eq!(sink.sections(), vec!["contact", "gift_options", "order_notes"]);
    }
}
