use crate::player::{PlaybackSignal, PlayerId};

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum Tab {
    Home,
    Shorts,
    Reward,
    Profile,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Home, Tab::Shorts, Tab::Reward, Tab::Profile];

    pub fn index(self) -> usize {
        match self {
            Tab::Home => 0,
            Tab::Shorts => 1,
            Tab::Reward => 2,
            Tab::Profile => 3,
        }
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn label_key(self) -> &'static str {
        match self {
            Tab::Home => "tabs.home",
            Tab::Shorts => "tabs.shorts",
            Tab::Reward => "tabs.reward",
            Tab::Profile => "tabs.profile",
        }
    }
}

#[derive(Clone, Debug)]
pub enum BgEvent {
    Playback {
        player: PlayerId,
        session: u64,
        signal: PlaybackSignal,
    },
}
