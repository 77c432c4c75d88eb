//! Fault-injection scenarios for the mission pipeline.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// MSN-001: Well-formed model reply, every waypoint lands on geometry
    Nominal,

    /// MSN-002: Reply wrapped in prose and a markdown fence
    FencedReply,

    /// MSN-003: Reply with no usable JSON
    GarbledReply,

    /// MSN-004: No language model configured
    SilentModel,

    /// MSN-005: Vision returns an empty description
    BlindCamera,

    /// MSN-006: Scene without any collision geometry
    NoSurface,

    /// MSN-007: Prompt dictates the flight order
    Directional,

    /// MSN-008: Second start while the first mission is in flight
    DoubleStart,

    /// MSN-009: Cancel while the model call is in flight
    CancelInFlight,

    /// MSN-010: Two missions back to back; the first is rolled back
    Regenerate,

    /// MSN-011: Vision answers only after its call budget has run out
    SlowCamera,

    /// MSN-012: Language model answers only after its call budget has run out
    SlowModel,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Nominal,
            ScenarioId::FencedReply,
            ScenarioId::GarbledReply,
            ScenarioId::SilentModel,
            ScenarioId::BlindCamera,
            ScenarioId::NoSurface,
            ScenarioId::Directional,
            ScenarioId::DoubleStart,
            ScenarioId::CancelInFlight,
            ScenarioId::Regenerate,
            ScenarioId::SlowCamera,
            ScenarioId::SlowModel,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "nominal",
            ScenarioId::FencedReply => "fenced_reply",
            ScenarioId::GarbledReply => "garbled_reply",
            ScenarioId::SilentModel => "silent_model",
            ScenarioId::BlindCamera => "blind_camera",
            ScenarioId::NoSurface => "no_surface",
            ScenarioId::Directional => "directional",
            ScenarioId::DoubleStart => "double_start",
            ScenarioId::CancelInFlight => "cancel_in_flight",
            ScenarioId::Regenerate => "regenerate",
            ScenarioId::SlowCamera => "slow_camera",
            ScenarioId::SlowModel => "slow_model",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "Clean JSON reply, all waypoints snapped, tour optimized",
            ScenarioId::FencedReply => "Fenced reply with chatter decodes like the clean one",
            ScenarioId::GarbledReply => "Prose-only reply falls back to the search pattern",
            ScenarioId::SilentModel => "No language model, fallback pattern flown",
            ScenarioId::BlindCamera => "Empty scene description fails the mission once",
            ScenarioId::NoSurface => "Empty scene, every waypoint kept unvalidated",
            ScenarioId::Directional => "Directional prompt keeps priority order",
            ScenarioId::DoubleStart => "Concurrent start rejected, one completion",
            ScenarioId::CancelInFlight => "Late model reply after cancel is discarded",
            ScenarioId::Regenerate => "Second mission rolls the registry back first",
            ScenarioId::SlowCamera => "Vision timeout on the virtual clock fails the mission",
            ScenarioId::SlowModel => "Model timeout on the virtual clock falls back",
        }
    }

    /// Returns true if the scenario drives missions in the background.
    pub fn is_concurrent(&self) -> bool {
        matches!(self, ScenarioId::DoubleStart | ScenarioId::CancelInFlight)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nominal" | "msn-001" => Ok(ScenarioId::Nominal),
            "fenced_reply" | "fenced" | "msn-002" => Ok(ScenarioId::FencedReply),
            "garbled_reply" | "garbled" | "msn-003" => Ok(ScenarioId::GarbledReply),
            "silent_model" | "silent" | "msn-004" => Ok(ScenarioId::SilentModel),
            "blind_camera" | "blind" | "msn-005" => Ok(ScenarioId::BlindCamera),
            "no_surface" | "nosurface" | "msn-006" => Ok(ScenarioId::NoSurface),
            "directional" | "msn-007" => Ok(ScenarioId::Directional),
            "double_start" | "doublestart" | "msn-008" => Ok(ScenarioId::DoubleStart),
            "cancel_in_flight" | "cancel" | "msn-009" => Ok(ScenarioId::CancelInFlight),
            "regenerate" | "msn-010" => Ok(ScenarioId::Regenerate),
            "slow_camera" | "msn-011" => Ok(ScenarioId::SlowCamera),
            "slow_model" | "msn-012" => Ok(ScenarioId::SlowModel),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
