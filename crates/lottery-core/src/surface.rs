use crate::error::LotteryError;
use crate::types::{ActorId, RequestId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Embed accent, mapped to the platform's colour bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Warning,
    Pending,
    Success,
    Celebration,
}

impl Tone {
    pub fn color(self) -> &'static str {
        match self {
            Self::Warning => "#FF0000",
            Self::Pending => "#FFA500",
            Self::Success => "#00FF00",
            Self::Celebration => "#FFD700",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub tone: Tone,
    pub color: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    pub fn new(tone: Tone, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tone,
            color: tone.color().to_string(),
            title: title.into(),
            description: description.into(),
            footer: None,
            timestamp: None,
        }
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionStyle {
    Success,
    Danger,
}

/// One button on a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub token: String,
    pub label: String,
    pub style: OptionStyle,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the invoking actor sees it.
    Actor,
    Channel,
}

/// Everything a surface needs to draw one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    #[serde(default)]
    pub options: Vec<PromptOption>,
    pub visibility: Visibility,
}

impl Presentation {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embed: None,
            options: Vec::new(),
            visibility: Visibility::Actor,
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            content: String::new(),
            embed: Some(embed),
            options: Vec::new(),
            visibility: Visibility::Actor,
        }
    }

    pub fn with_options(mut self, options: Vec<PromptOption>) -> Self {
        self.options = options;
        self
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Channel;
        self
    }

    /// Same view with every option greyed out.
    pub fn with_options_disabled(mut self) -> Self {
        for option in &mut self.options {
            option.disabled = true;
        }
        self
    }

    pub fn has_active_options(&self) -> bool {
        self.options.iter().any(|option| !option.disabled)
    }
}

/// Chat platform rendering, as seen by the workflows.
///
/// Every message belongs to one interaction, the command invocation identified by its
/// [`RequestId`]. An actor may have several interactions open at once; updating or disabling one
/// leaves the others as they are.
///
/// Button presses come back through [`crate::LotteryEngine::respond`], not through this trait.
#[async_trait]
pub trait InteractionSurface: Send + Sync {
    /// Show a decision prompt to `actor`; returns the confirm token.
    async fn present_prompt(
        &self,
        actor: &ActorId,
        interaction: RequestId,
        prompt: Presentation,
    ) -> Result<String, LotteryError>;

    /// Replace what `actor` sees for `interaction`.
    async fn update_presentation(
        &self,
        actor: &ActorId,
        interaction: RequestId,
        presentation: Presentation,
    ) -> Result<(), LotteryError>;

    async fn disable_options(
        &self,
        actor: &ActorId,
        interaction: RequestId,
    ) -> Result<(), LotteryError>;

    async fn broadcast_to_channel(&self, presentation: Presentation) -> Result<(), LotteryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabling_options_keeps_the_view() {
        let presentation = Presentation::embed(Embed::new(Tone::Warning, "t", "d"))
            .with_options(vec![PromptOption {
                token: "confirm_draw:abc".to_string(),
                label: "Confirm".to_string(),
                style: OptionStyle::Success,
                disabled: false,
            }]);
        assert!(presentation.has_active_options());

        let disabled = presentation.clone().with_options_disabled();
        assert!(!disabled.has_active_options());
        assert_eq!(disabled.embed, presentation.embed);
    }

    #[test]
    fn tone_maps_to_platform_colours() {
        assert_eq!(Tone::Warning.color(), "#FF0000");
        assert_eq!(Tone::Celebration.color(), "#FFD700");
        assert_eq!(Embed::new(Tone::Pending, "a", "b").color, "#FFA500");
    }
}
