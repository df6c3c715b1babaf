use std::collections::HashMap;

use crate::types::Tab;

/// Optional parameter bag a tab receives when navigated to.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct RouteParams {
    pub video_url: Option<String>,
    pub current_time: Option<f64>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum NavEvent {
    ParamsChanged(Tab),
    Blur(Tab),
    Focus(Tab),
}

/// Bottom-tab navigator: one focused tab, per-tab params.
#[derive(Debug)]
pub struct Navigator {
    current: Tab,
    params: HashMap<Tab, RouteParams>,
}

impl Navigator {
    pub fn new(initial: Tab) -> Self {
        Self {
            current: initial,
            params: HashMap::new(),
        }
    }

    pub fn current(&self) -> Tab {
        self.current
    }

    pub fn is_focused(&self, tab: Tab) -> bool {
        self.current == tab
    }

    pub fn params(&self, tab: Tab) -> Option<&RouteParams> {
        self.params.get(&tab)
    }

    /// Replaces a tab's params without switching to it. Every delivery is
    /// reported, even when the params equal the stored ones.
    pub fn set_params(&mut self, tab: Tab, params: RouteParams) -> Vec<NavEvent> {
        self.params.insert(tab, params);
        vec![NavEvent::ParamsChanged(tab)]
    }

    /// Params are applied before focus moves, so a surface mounted by the
    /// focus event already sees them.
    pub fn navigate(&mut self, tab: Tab, params: Option<RouteParams>) -> Vec<NavEvent> {
        let mut events = match params {
            Some(params) => self.set_params(tab, params),
            None => Vec::new(),
        };

        if self.current != tab {
            events.push(NavEvent::Blur(self.current));
            events.push(NavEvent::Focus(tab));
            self.current = tab;
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handoff(url: &str, time: f64) -> RouteParams {
        RouteParams {
            video_url: Some(url.to_string()),
            current_time: Some(time),
        }
    }

    #[test]
    fn navigate_blurs_previous_then_focuses_target() {
        let mut nav = Navigator::new(Tab::Home);
        assert!(nav.is_focused(Tab::Home));

        let events = nav.navigate(Tab::Reward, None);
        assert_eq!(
            events,
            vec![NavEvent::Blur(Tab::Home), NavEvent::Focus(Tab::Reward)]
        );
        assert_eq!(nav.current(), Tab::Reward);
        assert!(nav.navigate(Tab::Reward, None).is_empty());
    }

    #[test]
    fn params_change_precedes_focus() {
        let mut nav = Navigator::new(Tab::Home);
        let events = nav.navigate(Tab::Shorts, Some(handoff("u1", 42.0)));
        assert_eq!(
            events,
            vec![
                NavEvent::ParamsChanged(Tab::Shorts),
                NavEvent::Blur(Tab::Home),
                NavEvent::Focus(Tab::Shorts),
            ]
        );
        assert_eq!(nav.params(Tab::Shorts), Some(&handoff("u1", 42.0)));
    }

    #[test]
    fn identical_params_are_delivered_again() {
        let mut nav = Navigator::new(Tab::Home);
        assert_eq!(
            nav.set_params(Tab::Shorts, handoff("u1", 3.0)),
            vec![NavEvent::ParamsChanged(Tab::Shorts)]
        );
        assert!(nav.is_focused(Tab::Home));

        let events = nav.navigate(Tab::Shorts, Some(handoff("u1", 3.0)));
        assert_eq!(
            events,
            vec![
                NavEvent::ParamsChanged(Tab::Shorts),
                NavEvent::Blur(Tab::Home),
                NavEvent::Focus(Tab::Shorts),
            ]
        );
    }

    #[test]
    fn navigate_without_params_keeps_the_stored_ones() {
        let mut nav = Navigator::new(Tab::Home);
        nav.set_params(Tab::Shorts, handoff("u1", 3.0));
        let events = nav.navigate(Tab::Shorts, None);
        assert_eq!(
            events,
            vec![NavEvent::Blur(Tab::Home), NavEvent::Focus(Tab::Shorts)]
        );
        assert_eq!(nav.params(Tab::Shorts), Some(&handoff("u1", 3.0)));
    }
}
