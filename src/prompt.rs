use thiserror::Error;

use crate::catalog::{resolve_scene, CameraStyle, JERSEY_COLORS, PLAYER_DESCRIPTIONS};

const SELFIE_PREFIX: &str = "Authentic smartphone selfie, taken with front camera at arm's length, slightly from below angle. Minor imperfections: not perfectly centered, natural front-camera lens distortion, slight warmth from indoor/outdoor lighting. ";

const THIRD_PERSON_PREFIX: &str = "Authentic smartphone photograph taken by a friend or bystander. Shot with rear camera, natural framing, the photographer is standing 1.5-2 meters away. Slightly candid feel, not perfectly composed. Natural available light, no flash. ";

const PHOTO_SUFFIX: &str = " This must look identical to a real photograph posted on social media. NOT a render, NOT AI art, NOT a professional photoshoot. Real camera sensor noise at high ISO, natural depth of field, authentic color grading from smartphone processing. Realistic skin with pores, natural under-eye shadows, authentic fabric wrinkles on clothing. No extra fingers, perfect human anatomy, natural proportions.";

const IDENTITY_SUFFIX: &str = " CRITICAL: The fan in this image must be the EXACT same person as shown in the reference photo. Preserve their face, skin tone, hair color, hair style, facial hair, and all distinguishing features with 100% accuracy. Do not alter their appearance in any way.";

const USER_DESC: &str = "the person shown in the reference photo";

/// Which pipeline variant the prompt feeds. The two-stage pipeline keeps
/// identity wording out of stage 1; the face-swap stage owns face fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStage {
    FullComposite,
    SceneOnly,
}

#[derive(Debug, Clone)]
pub struct PlayerPromptData {
    pub name: String,
    pub country: String,
    pub number: i64,
    pub team_colors: [String; 2],
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Unknown scene: {0}")]
    UnknownScene(String),
}

fn player_description(player: &PlayerPromptData) -> String {
    PLAYER_DESCRIPTIONS
        .get(player.name.as_str())
        .map(|desc| desc.to_string())
        .unwrap_or_else(|| {
            format!("{}, the famous {} footballer", player.name, player.country)
        })
}

fn jersey_description(player: &PlayerPromptData) -> String {
    let colors = JERSEY_COLORS
        .get(player.country.as_str())
        .map(|desc| desc.to_string())
        .unwrap_or_else(|| {
            format!("{} and {}", player.team_colors[0], player.team_colors[1])
        });
    format!("{colors}, number {} on the back", player.number)
}

/// Assembles the full natural-language prompt for a scene. Pure string
/// construction; same inputs always give the same output.
pub fn build_prompt(
    scene_id: &str,
    player: &PlayerPromptData,
    stage: PromptStage,
) -> Result<String, PromptError> {
    let scene =
        resolve_scene(scene_id).ok_or_else(|| PromptError::UnknownScene(scene_id.to_string()))?;

    let prefix = match scene.camera {
        CameraStyle::Selfie => SELFIE_PREFIX,
        CameraStyle::ThirdPerson => THIRD_PERSON_PREFIX,
    };

    let player_desc = player_description(player);
    let jersey_desc = jersey_description(player);

    let mut body = format!("{} {}", scene.action, scene.detail);
    body = body
        .replace("[PLAYER_DESC]", &player_desc)
        .replace("[PLAYER_NAME]", &player.name)
        .replace("[USER_DESC]", USER_DESC)
        .replace("[COUNTRY]", &player.country)
        .replace("[TEAM_COLORS]", &jersey_desc);

    let mut prompt = format!("{prefix}{body}{PHOTO_SUFFIX}");
    if stage == PromptStage::FullComposite {
        prompt.push_str(IDENTITY_SUFFIX);
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SCENES;

    fn messi() -> PlayerPromptData {
        PlayerPromptData {
            name: "Lionel Messi".to_string(),
            country: "Argentina".to_string(),
            number: 10,
            team_colors: ["#75AADB".to_string(), "#FFFFFF".to_string()],
        }
    }

    #[test]
    fn every_scene_produces_a_prompt_with_country_and_action_text() {
        for scene in SCENES.values() {
            let prompt = build_prompt(scene.id, &messi(), PromptStage::FullComposite).unwrap();
            assert!(!prompt.is_empty());
            assert!(prompt.contains("Argentina"), "scene {}", scene.id);
            // A literal fragment of the action text survives substitution.
            let literal_tail = scene
                .action
                .rsplit(']')
                .next()
                .unwrap()
                .trim_start_matches(|c: char| c == ')' || c == ',' || c.is_whitespace());
            assert!(
                prompt.contains(literal_tail),
                "scene {} lost its action text",
                scene.id
            );
            assert!(!prompt.contains('['), "unfilled placeholder in {}", scene.id);
        }
    }

    #[test]
    fn unknown_player_falls_back_to_generic_description() {
        let player = PlayerPromptData {
            name: "Arda Güler".to_string(),
            country: "Turkey".to_string(),
            number: 10,
            team_colors: ["#E30A17".to_string(), "#FFFFFF".to_string()],
        };
        let prompt = build_prompt("vip_tunnel", &player, PromptStage::FullComposite).unwrap();
        assert!(prompt.contains("Arda Güler, the famous Turkey footballer"));
    }

    #[test]
    fn unknown_scene_is_an_error() {
        let err = build_prompt("moon_landing", &messi(), PromptStage::FullComposite).unwrap_err();
        assert!(matches!(err, PromptError::UnknownScene(ref id) if id == "moon_landing"));
    }

    #[test]
    fn unknown_country_falls_back_to_raw_team_colors() {
        let player = PlayerPromptData {
            name: "Someone".to_string(),
            country: "Atlantis".to_string(),
            number: 7,
            team_colors: ["teal".to_string(), "gold".to_string()],
        };
        let prompt = build_prompt("mixed_zone", &player, PromptStage::FullComposite).unwrap();
        assert!(prompt.contains("teal and gold, number 7 on the back"));
    }

    #[test]
    fn scene_only_stage_drops_identity_wording() {
        let full = build_prompt("vip_tunnel", &messi(), PromptStage::FullComposite).unwrap();
        let scene_only = build_prompt("vip_tunnel", &messi(), PromptStage::SceneOnly).unwrap();
        assert!(full.contains("EXACT same person"));
        assert!(!scene_only.contains("EXACT same person"));
        assert!(full.len() > scene_only.len());
    }

    #[test]
    fn prompt_is_deterministic() {
        let a = build_prompt("warmup_pitch", &messi(), PromptStage::SceneOnly).unwrap();
        let b = build_prompt("warmup_pitch", &messi(), PromptStage::SceneOnly).unwrap();
        assert_eq!(a, b);
    }
}
