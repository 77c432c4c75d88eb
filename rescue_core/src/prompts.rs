//! Prompt construction and mission-text inspection.

/// System prompt for the spatial reasoning model.
pub const WAYPOINT_SYSTEM_PROMPT: &str = "You are a spatial reasoning engine for a drone simulator. \
You receive a scene description from a vision model and a user's mission objective. \
Identify 2-6 points of interest and output ONLY a JSON array. \
Each entry: {\"name\": \"snake_case_string\", \"forward\": float_meters, \"right\": float_meters, \
\"up\": float_meters, \"priority\": int_1_is_highest}. \
Use realistic distances 1-10m. Output nothing but the JSON array.";

/// Builds the mission-aware prompt sent with the camera frame.
pub fn vision_prompt(mission: &str) -> String {
    format!(
        "Describe what you see in detail. Focus on objects, structures, obstacles, open spaces, \
         spatial layout. The user's mission is: {}. Identify anything relevant to this mission.",
        mission
    )
}

/// Builds the user half of the waypoint request.
pub fn waypoint_user_prompt(scene_description: &str, mission: &str) -> String {
    format!(
        "Scene: {}\nMission: {}\nOutput JSON array of waypoints:",
        scene_description, mission
    )
}

/// True if the mission text dictates a flight order (case-insensitive).
pub fn has_directional_hint<S: AsRef<str>>(mission: &str, hints: &[S]) -> bool {
    let lower = mission.to_lowercase();
    hints
        .iter()
        .map(|h| h.as_ref().to_lowercase())
        .any(|h| !h.is_empty() && lower.contains(&h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_vision_prompt_mentions_mission() {
        let prompt = vision_prompt("find survivors near the stairs");
        assert!(prompt.starts_with("Describe what you see in detail."));
        assert!(prompt.contains("The user's mission is: find survivors near the stairs."));
    }

    #[test]
    fn test_user_prompt_layout() {
        assert_eq!(
            waypoint_user_prompt("a hallway", "check doors"),
            "Scene: a hallway\nMission: check doors\nOutput JSON array of waypoints:"
        );
    }

    #[test]
    fn test_directional_hints() {
        let hints = PipelineConfig::default().directional_hints;

        assert!(has_directional_hint("Sweep the room CLOCKWISE", &hints));
        assert!(has_directional_hint("start from the window", &hints));
        assert!(has_directional_hint("go North first", &hints));
        assert!(!has_directional_hint("find survivors", &hints));
        assert!(!has_directional_hint("", &hints));
    }

    #[test]
    fn test_blank_hint_never_matches() {
        assert!(!has_directional_hint("anything", &[""]));
    }
}
