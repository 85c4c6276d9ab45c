use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lottery_core::{ActorId, InteractionSurface, LotteryError, Presentation, RequestId, Visibility};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub const ANNOUNCEMENT_LIMIT: usize = 100;

/// Views kept per actor before the oldest settled one is forgotten.
pub const VIEW_LIMIT: usize = 25;

/// A public message posted to the channel feed.
#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub posted_at: DateTime<Utc>,
    pub presentation: Presentation,
}

/// What one actor currently sees for one interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionView {
    pub request_id: RequestId,
    pub updated_at: DateTime<Utc>,
    pub presentation: Presentation,
    #[serde(skip)]
    revision: u64,
}

#[derive(Default)]
struct ChannelState {
    views: HashMap<ActorId, HashMap<RequestId, InteractionView>>,
    announcements: VecDeque<Announcement>,
    revision: u64,
}

impl ChannelState {
    fn show(&mut self, actor: &ActorId, interaction: RequestId, presentation: Presentation) {
        self.revision += 1;
        let revision = self.revision;
        let views = self.views.entry(actor.clone()).or_default();
        views.insert(
            interaction,
            InteractionView {
                request_id: interaction,
                updated_at: Utc::now(),
                presentation,
                revision,
            },
        );
        if views.len() > VIEW_LIMIT {
            evict_oldest(views);
        }
    }
}

/// Prefer forgetting a view nobody can answer any more.
fn evict_oldest(views: &mut HashMap<RequestId, InteractionView>) {
    let settled = views
        .values()
        .filter(|view| !view.presentation.has_active_options())
        .min_by_key(|view| view.revision)
        .map(|view| view.request_id);
    let victim = settled.or_else(|| {
        views
            .values()
            .min_by_key(|view| view.revision)
            .map(|view| view.request_id)
    });
    if let Some(request_id) = victim {
        views.remove(&request_id);
    }
}

/// In-process stand-in for the chat platform.
///
/// Keeps an actor-private view per interaction and a bounded public feed that HTTP clients
/// poll.
#[derive(Default)]
pub struct ChannelSurface {
    state: Mutex<ChannelState>,
}

impl ChannelSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every view `actor` has open, least recently changed first.
    pub fn views(&self, actor: &ActorId) -> Result<Vec<InteractionView>, LotteryError> {
        let state = self.lock()?;
        let mut views: Vec<InteractionView> = state
            .views
            .get(actor)
            .map(|views| views.values().cloned().collect())
            .unwrap_or_default();
        views.sort_by_key(|view| view.revision);
        Ok(views)
    }

    pub fn view(
        &self,
        actor: &ActorId,
        interaction: RequestId,
    ) -> Result<Option<InteractionView>, LotteryError> {
        Ok(self
            .lock()?
            .views
            .get(actor)
            .and_then(|views| views.get(&interaction))
            .cloned())
    }

    /// Channel feed, newest last.
    pub fn announcements(&self) -> Result<Vec<Announcement>, LotteryError> {
        Ok(self.lock()?.announcements.iter().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChannelState>, LotteryError> {
        self.state
            .lock()
            .map_err(|_| LotteryError::Surface("channel state lock poisoned".to_string()))
    }
}

#[async_trait]
impl InteractionSurface for ChannelSurface {
    async fn present_prompt(
        &self,
        actor: &ActorId,
        interaction: RequestId,
        prompt: Presentation,
    ) -> Result<String, LotteryError> {
        let token = prompt
            .options
            .first()
            .map(|option| option.token.clone())
            .ok_or_else(|| LotteryError::Surface("prompt has no options".to_string()))?;
        self.lock()?.show(actor, interaction, prompt);
        debug!(actor = %actor, request_id = %interaction, "prompt presented");
        Ok(token)
    }

    async fn update_presentation(
        &self,
        actor: &ActorId,
        interaction: RequestId,
        presentation: Presentation,
    ) -> Result<(), LotteryError> {
        self.lock()?.show(actor, interaction, presentation);
        Ok(())
    }

    async fn disable_options(
        &self,
        actor: &ActorId,
        interaction: RequestId,
    ) -> Result<(), LotteryError> {
        let mut state = self.lock()?;
        let view = state
            .views
            .get(actor)
            .and_then(|views| views.get(&interaction))
            .map(|view| view.presentation.clone());
        if let Some(presentation) = view {
            state.show(actor, interaction, presentation.with_options_disabled());
        }
        Ok(())
    }

    async fn broadcast_to_channel(&self, presentation: Presentation) -> Result<(), LotteryError> {
        if presentation.visibility != Visibility::Channel {
            return Err(LotteryError::Surface(
                "refusing to broadcast an actor-private presentation".to_string(),
            ));
        }
        let mut state = self.lock()?;
        if state.announcements.len() == ANNOUNCEMENT_LIMIT {
            state.announcements.pop_front();
        }
        state.announcements.push_back(Announcement {
            posted_at: Utc::now(),
            presentation,
        });
        Ok(())
    }
}
