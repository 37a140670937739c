use std::sync::mpsc;

use url::Url;

use crate::io::gateway::StorageGateway;
use crate::io::store::KeyValueStore;
use crate::model::{DueDate, SessionId};

pub const PARAM_WIN: &str = "win";
pub const PARAM_DUE_DATE: &str = "dueDate";
pub const PARAM_TITLE: &str = "title";
pub const PARAM_DETAILS: &str = "details";

/// Session fields carried by a location's query. Missing and empty
/// parameters are both `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    pub win: Option<String>,
    pub title: Option<String>,
    pub details: Option<String>,
    pub due_date: Option<String>,
}

impl UrlState {
    /// Parse the query of `url`. The first occurrence of a repeated
    /// parameter wins.
    pub fn from_url(url: &Url) -> Self {
        let mut state = UrlState::default();
        for (name, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            let slot = match name.as_ref() {
                PARAM_WIN => &mut state.win,
                PARAM_TITLE => &mut state.title,
                PARAM_DETAILS => &mut state.details,
                PARAM_DUE_DATE => &mut state.due_date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        state
    }
}

/// Notification emitted after every in-place location rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Replaced { url: Url },
}

/// The tab's current location, kept in the shape
/// `?win=…&dueDate=…&title=…&details=…`.
///
/// Writes replace the location in place: no history entry is added and
/// nothing is reloaded.
#[derive(Debug)]
pub struct UrlMirror {
    location: Url,
    replace_count: usize,
    subscribers: Vec<mpsc::Sender<NavigationEvent>>,
}

impl UrlMirror {
    pub fn new(location: Url) -> Self {
        UrlMirror {
            location,
            replace_count: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        Ok(UrlMirror::new(Url::parse(location)?))
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// How many times the location has been rewritten.
    pub fn replace_count(&self) -> usize {
        self.replace_count
    }

    /// Receive a [`NavigationEvent`] after each rewrite.
    pub fn subscribe(&mut self) -> mpsc::Receiver<NavigationEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn read(&self) -> UrlState {
        UrlState::from_url(&self.location)
    }

    /// Rewrite the query for `id`. The due date is read from storage, not
    /// taken from the caller, so it reflects whatever was last saved.
    pub fn write<S: KeyValueStore>(
        &mut self,
        gateway: &StorageGateway<S>,
        id: &SessionId,
        title: &str,
        details: &str,
    ) -> &Url {
        let due = gateway.due_date(id);
        set_session_query(&mut self.location, id, due, title, details);
        self.replace_count += 1;

        let event = NavigationEvent::Replaced {
            url: self.location.clone(),
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::debug!(url = %self.location, "location replaced");
        &self.location
    }

    /// Location that opens session `id` with its stored content.
    pub fn share_link<S: KeyValueStore>(&self, gateway: &StorageGateway<S>, id: &SessionId) -> Url {
        let mut url = self.location.clone();
        set_session_query(
            &mut url,
            id,
            gateway.due_date(id),
            &gateway.text(id, crate::model::TextField::Title),
            &gateway.text(id, crate::model::TextField::Details),
        );
        url
    }
}

/// Replace query and fragment with the session parameters, in fixed order,
/// omitting empty values.
fn set_session_query(url: &mut Url, id: &SessionId, due: DueDate, title: &str, details: &str) {
    url.set_fragment(None);
    url.set_query(None);
    let mut query = url.query_pairs_mut();
    query.append_pair(PARAM_WIN, id.as_str());
    if let DueDate::Date(_) = due {
        query.append_pair(PARAM_DUE_DATE, &due.to_string());
    }
    if !title.is_empty() {
        query.append_pair(PARAM_TITLE, title);
    }
    if !details.is_empty() {
        query.append_pair(PARAM_DETAILS, details);
    }
}
