// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Navigation requests emitted by the session layer.

use crate::config::Config;
use tokio::sync::watch;

/// Where the session layer wants the user to go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Login entry point
    Login,
    /// Authenticated home view
    Home,
}

/// Navigation sink. Holds the most recent request for late subscribers.
pub struct Navigator {
    login_route: String,
    home_route: String,
    latest: watch::Sender<Option<Destination>>,
}

impl Navigator {
    pub fn new(config: &Config) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            login_route: config.login_route.clone(),
            home_route: config.home_route.clone(),
            latest,
        }
    }

    pub fn navigate(&self, destination: Destination) {
        tracing::info!(
            destination = ?destination,
            route = %self.route(destination),
            "Navigating"
        );
        self.latest.send_replace(Some(destination));
    }

    /// Route path for `destination`.
    pub fn route(&self, destination: Destination) -> &str {
        match destination {
            Destination::Login => &self.login_route,
            Destination::Home => &self.home_route,
        }
    }

    pub fn last(&self) -> Option<Destination> {
        *self.latest.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Destination>> {
        self.latest.subscribe()
    }
}
