//! Load statistics reported by nodes.

use serde::{Deserialize, Serialize};

/// A periodic load report from a node.
///
/// These are used only to choose nodes for new work; player state is
/// always taken from `playerUpdate` frames.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Number of players on the node.
    pub players: u32,
    /// Number of players currently playing a track.
    pub playing_players: u32,
    /// Node uptime, in milliseconds.
    pub uptime: u64,
    /// Memory use of the node's JVM, in bytes.
    pub memory: Memory,
    /// CPU use of the node's host.
    pub cpu: Cpu,
    /// Audio frame counters over the last minute.
    ///
    /// Omitted by nodes which are not sending any audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_stats: Option<FrameStats>,
}

/// Memory use of a node, in bytes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Memory {
    /// Free memory.
    pub free: u64,
    /// Used memory.
    pub used: u64,
    /// Allocated memory.
    pub allocated: u64,
    /// Memory which may be allocated.
    pub reservable: u64,
}

/// CPU use of a node's host.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    /// Number of cores.
    pub cores: u32,
    /// Load of the whole system, from `0.0` to `1.0`.
    pub system_load: f64,
    /// Load of the node process, from `0.0` to `1.0`.
    pub lavalink_load: f64,
}

/// Audio frame counters over the last minute.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FrameStats {
    /// Frames sent to Discord.
    pub sent: i64,
    /// Frames which were nulled.
    pub nulled: i64,
    /// Difference between expected and sent frames.
    pub deficit: i64,
}

/// Frames a player sends each minute at 50 frames per second.
const EXPECTED_FRAMES: f64 = 3000.0;

impl Stats {
    /// Load penalty of this node: lower is better.
    ///
    /// Combines playing players, CPU load, and per-player frame
    /// deficits into a single score, weighted as Lavalink's own
    /// load balancer does.
    #[must_use]
    pub fn penalty(&self) -> f64 {
        let players = f64::from(self.playing_players);
        let cpu = 1.05f64.powf(100.0 * self.cpu.system_load) * 10.0 - 10.0;

        let (deficit, nulled) = match self.frame_stats {
            Some(frames) if frames.deficit != -1 => {
                let deficit = frames.deficit.max(0) as f64;
                let nulled = frames.nulled.max(0) as f64;

                (
                    1.03f64.powf(500.0 * (deficit / EXPECTED_FRAMES)) * 600.0 - 600.0,
                    (1.03f64.powf(500.0 * (nulled / EXPECTED_FRAMES)) * 300.0 - 300.0) * 2.0,
                )
            },
            _ => (0.0, 0.0),
        };

        players + cpu + deficit + nulled
    }
}
