use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Camera treatment for a scene: a phone-at-arm's-length selfie or a shot
/// taken by a bystander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStyle {
    Selfie,
    ThirdPerson,
}

/// One entry of the scene catalog. `action` describes the encounter itself,
/// `detail` the surroundings and light. Both carry `[USER_DESC]`,
/// `[PLAYER_NAME]`, `[PLAYER_DESC]`, `[COUNTRY]` and `[TEAM_COLORS]`
/// placeholders filled in by the prompt builder.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: &'static str,
    pub camera: CameraStyle,
    pub action: &'static str,
    pub detail: &'static str,
}

pub static SCENES: Lazy<HashMap<&'static str, Scene>> = Lazy::new(|| {
    let scenes = [
        Scene {
            id: "vip_tunnel",
            camera: CameraStyle::Selfie,
            action: "[USER_DESC] is taking a quick selfie with [PLAYER_DESC] in a stadium tunnel after a FIFA World Cup 2026 match. [PLAYER_NAME] is wearing the [COUNTRY] national team jersey ([TEAM_COLORS]), visibly sweaty with flushed cheeks, and has briefly stopped walking to lean into the fan's selfie with a quick, polite smile. [USER_DESC] is holding the phone up with one hand, looking excited and slightly nervous.",
            detail: "Concrete tunnel walls, dim fluorescent overhead lights, other staff and players walking past in the blurred background. The selfie captures both faces at close range, [PLAYER_NAME] slightly taller in frame.",
        },
        Scene {
            id: "pitchside_quick",
            camera: CameraStyle::Selfie,
            action: "[USER_DESC] has managed a quick selfie with [PLAYER_DESC] at the edge of the pitch after a World Cup match. [PLAYER_NAME] in the [COUNTRY] match jersey ([TEAM_COLORS]), grass stains on shorts, sweat glistening on forehead, has leaned over the advertising board barrier for the photo. [USER_DESC] is reaching up with the phone from the front row.",
            detail: "Stadium seats, green pitch, and floodlights creating slight lens flare in the background. Excited crowd partially visible. Quick, spontaneous moment.",
        },
        Scene {
            id: "mixed_zone",
            camera: CameraStyle::ThirdPerson,
            action: "[USER_DESC] standing next to [PLAYER_DESC] in the mixed zone area after a World Cup 2026 match. [PLAYER_NAME] in the [COUNTRY] jersey ([TEAM_COLORS]) with a towel draped over one shoulder, face still flushed from the match. They stand side by side with a small gap between them, not touching, just standing close for the photo. [USER_DESC] is smiling broadly. [PLAYER_NAME] gives a tired but genuine half-smile.",
            detail: "Media backdrop with FIFA sponsors partially visible behind them. Harsh fluorescent lighting creating slight shadows. A friend or media person took this photo from about 2 meters away.",
        },
        Scene {
            id: "training_ground",
            camera: CameraStyle::ThirdPerson,
            action: "[USER_DESC] posing for a photo with [PLAYER_DESC] at a World Cup 2026 training session. [PLAYER_NAME] in the [COUNTRY] training kit (casual athletic wear in [TEAM_COLORS]) has walked to the barrier fence to meet fans. They stand side by side on opposite sides of a low fence, [PLAYER_NAME] leaning on it casually. [USER_DESC] is beaming.",
            detail: "Training pitch, cones, and other players stretching visible in the background. Bright outdoor daylight casting natural shadows. Another fan nearby took this photo.",
        },
        Scene {
            id: "hotel_encounter",
            camera: CameraStyle::Selfie,
            action: "[USER_DESC] has spotted [PLAYER_DESC] in a luxury hotel lobby and asked for a quick selfie. [PLAYER_NAME] is in casual designer clothing, a clean fitted t-shirt with an expensive watch visible, relaxed posture, and has politely agreed, leaning slightly toward the camera with a casual smile. [USER_DESC] holds the phone up, looking thrilled and slightly starstruck.",
            detail: "Elegant hotel lobby background with marble floor, modern furniture, warm ambient lighting. Other hotel guests walking past, slightly blurred. A candid, lucky encounter moment.",
        },
        Scene {
            id: "stadium_exit",
            camera: CameraStyle::ThirdPerson,
            action: "[USER_DESC] next to [PLAYER_DESC] outside the stadium after a World Cup 2026 night match. [PLAYER_NAME] in the [COUNTRY] team tracksuit ([TEAM_COLORS]), headphones around the neck, holding a phone, about to board the team bus, has stopped for a brief moment for this photo. They stand close but not touching. [USER_DESC] is grinning.",
            detail: "Night time, stadium exterior lights illuminating them, crowd and team bus in the background. Security personnel partially visible. A friend quickly snapped this photo.",
        },
        Scene {
            id: "celebration_moment",
            camera: CameraStyle::ThirdPerson,
            action: "[USER_DESC] on the pitch with [PLAYER_DESC] during post-match celebrations after [COUNTRY] won their World Cup 2026 match. [PLAYER_NAME] in the [COUNTRY] jersey ([TEAM_COLORS]), ecstatic, sweaty, jersey slightly untucked, one arm raised in celebration. [USER_DESC] has somehow gotten close during the pitch invasion and is euphoric.",
            detail: "Confetti falling, other celebrating players and fans in the chaotic background. Floodlit stadium, electric atmosphere. Someone in the crowd captured this moment.",
        },
        Scene {
            id: "autograph_line",
            camera: CameraStyle::ThirdPerson,
            action: "[USER_DESC] at a FIFA fan zone autograph session with [PLAYER_DESC]. [PLAYER_NAME] sitting behind a table wearing the [COUNTRY] team polo ([TEAM_COLORS]), marker pen in hand, looking up at the camera with a practiced, warm smile. [USER_DESC] is standing on the other side of the table, leaning forward slightly with a big smile.",
            detail: "FIFA and sponsor branding visible on the backdrop. Indoor event lighting, queue of other fans visible in the background. An event photographer or friend took this photo.",
        },
        Scene {
            id: "warmup_pitch",
            camera: CameraStyle::Selfie,
            action: "[USER_DESC] taking a selfie from the front row of the stadium during World Cup 2026 warmup. [PLAYER_DESC] in the [COUNTRY] warmup bib ([TEAM_COLORS]) has jogged over to the stands and leaned close to the barrier for a quick photo: loose, relaxed, pre-match focused energy, slight smile. [USER_DESC] reaching forward with the phone, excited.",
            detail: "Nearly empty stadium behind them, pristine green pitch, other players warming up in the distance. Late afternoon golden hour light.",
        },
        Scene {
            id: "airport_arrival",
            camera: CameraStyle::Selfie,
            action: "[USER_DESC] taking a selfie with [PLAYER_DESC] at an airport. [PLAYER_NAME] in smart casual travel clothing, a designer jacket, comfortable pants, sunglasses pushed up on the head, pulling carry-on luggage, has stopped briefly in the terminal for this fan photo with a quick, friendly smile. [USER_DESC] is clearly excited.",
            detail: "Airport terminal background with departure boards, other travelers, bright terminal lighting. A quick, lucky airport encounter selfie.",
        },
    ];

    scenes.into_iter().map(|scene| (scene.id, scene)).collect()
});

// Earlier pipeline iterations shipped under different scene ids; the client
// may still send them.
static SCENE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("tunnel_encounter", "vip_tunnel"),
        ("tunnel", "vip_tunnel"),
        ("celebration", "celebration_moment"),
        ("stadium_pitch", "pitchside_quick"),
    ])
});

pub fn resolve_scene(scene_id: &str) -> Option<&'static Scene> {
    let canonical = SCENE_ALIASES
        .get(scene_id)
        .copied()
        .unwrap_or(scene_id);
    SCENES.get(canonical)
}

/// Jersey colour wording per country, mirroring the seeded player table.
pub static JERSEY_COLORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Argentina", "light blue and white striped"),
        ("Brazil", "yellow with green trim"),
        ("France", "dark blue with red and white trim"),
        ("Germany", "white with black trim"),
        ("Spain", "red with navy blue shorts"),
        ("England", "white with navy blue trim"),
        ("Portugal", "dark red with green trim"),
        ("Turkey", "red with white trim"),
        ("Netherlands", "bright orange with black trim"),
        ("Italy", "azure blue with white trim"),
        ("Belgium", "red with black and yellow trim"),
        ("Croatia", "red and white checkered"),
        ("Uruguay", "sky blue with white trim"),
        ("Colombia", "yellow with navy blue trim"),
        ("Mexico", "dark green with white and red trim"),
        ("Japan", "dark blue with white trim"),
        ("South Korea", "red with black trim"),
        ("Australia", "gold yellow with green trim"),
        ("USA", "white with navy blue and red trim"),
        ("Canada", "red with white trim"),
        ("Morocco", "red with green trim"),
        ("Senegal", "white with green trim"),
        ("Ghana", "white with yellow and black trim"),
        ("Nigeria", "green with white trim"),
        ("Egypt", "red with white trim"),
        ("Cameroon", "green with red and yellow trim"),
        ("Saudi Arabia", "white with green trim"),
        ("Iran", "white with red trim"),
        ("Qatar", "maroon with white trim"),
        ("Poland", "white with red trim"),
        ("Denmark", "red with white trim"),
        ("Sweden", "yellow with blue trim"),
        ("Norway", "red with navy blue and white trim"),
        ("Switzerland", "red with white cross"),
        ("Austria", "red with white trim"),
        ("Serbia", "red with white and blue trim"),
        ("Scotland", "navy blue with white trim"),
        ("Wales", "red with white trim"),
        ("Czech Republic", "red with white and blue trim"),
        ("Ecuador", "yellow with blue trim"),
        ("Paraguay", "red and white striped"),
        ("Chile", "red with blue shorts"),
        ("Peru", "white with red diagonal sash"),
        ("Costa Rica", "red with blue and white trim"),
        ("Panama", "red with blue and white trim"),
        ("Honduras", "white with blue trim"),
        ("Jamaica", "gold and green with black trim"),
        ("Ivory Coast", "orange with white and green trim"),
        ("Tunisia", "red with white trim"),
        ("Algeria", "white with green trim"),
        ("South Africa", "yellow with green trim"),
        ("DR Congo", "blue with red and yellow trim"),
        ("Mali", "yellow with green trim"),
        ("Burkina Faso", "green with red trim"),
        ("New Zealand", "white with silver fern"),
        ("China", "red with yellow trim"),
        ("India", "blue with white trim"),
        ("Bosnia and Herzegovina", "blue with white and yellow trim"),
    ])
});

/// Canonical physical descriptions for the marquee players. Everyone else
/// gets the generic fallback from the prompt builder.
pub static PLAYER_DESCRIPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "Lionel Messi",
            "Lionel Messi, the famous Argentina international footballer, short stature, full dark beard, shoulder-length brown hair, calm expression",
        ),
        (
            "Kylian Mbappé",
            "Kylian Mbappé, the famous France international footballer, athletic build, very short dark hair, boyish grin",
        ),
        (
            "Vinícius Jr",
            "Vinícius Jr, the famous Brazil international footballer, lean and quick, short curly dark hair, bright wide smile",
        ),
        (
            "Jude Bellingham",
            "Jude Bellingham, the famous England international footballer, tall and broad-shouldered, close-cropped dark hair, confident expression",
        ),
        (
            "Lamine Yamal",
            "Lamine Yamal, the famous Spain international footballer, teenage winger with short dark curly hair and a playful smile",
        ),
        (
            "Jamal Musiala",
            "Jamal Musiala, the famous Germany international footballer, slim and agile, short dark hair, soft friendly features",
        ),
        (
            "Cristiano Ronaldo",
            "Cristiano Ronaldo, the famous Portugal international footballer, chiseled athletic build, short dark hair with sharp fade, strong jawline",
        ),
        (
            "Erling Haaland",
            "Erling Haaland, the famous Norway international footballer, towering muscular frame, long blond hair often tied back, pale complexion",
        ),
        (
            "Mohamed Salah",
            "Mohamed Salah, the famous Egypt international footballer, compact muscular build, distinctive curly dark hair and full beard, warm smile",
        ),
        (
            "Antoine Griezmann",
            "Antoine Griezmann, the famous France international footballer, medium build, swept-back hair, mischievous grin",
        ),
        (
            "Harry Kane",
            "Harry Kane, the famous England international footballer, sturdy striker's build, short light-brown hair, composed expression",
        ),
        (
            "Kevin De Bruyne",
            "Kevin De Bruyne, the famous Belgium international footballer, pale complexion, short ginger hair, focused ice-blue eyes",
        ),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_scene_templates_carry_player_placeholders() {
        for scene in SCENES.values() {
            assert!(
                scene.action.contains("[PLAYER_DESC]"),
                "scene {} is missing [PLAYER_DESC]",
                scene.id
            );
            assert!(
                scene.action.contains("[USER_DESC]"),
                "scene {} is missing [USER_DESC]",
                scene.id
            );
        }
    }

    #[test]
    fn legacy_scene_ids_resolve_through_aliases() {
        assert_eq!(resolve_scene("tunnel_encounter").unwrap().id, "vip_tunnel");
        assert_eq!(resolve_scene("vip_tunnel").unwrap().id, "vip_tunnel");
        assert!(resolve_scene("moon_landing").is_none());
    }

    #[test]
    fn jersey_colors_cover_the_seeded_countries() {
        assert_eq!(
            JERSEY_COLORS.get("Argentina").copied(),
            Some("light blue and white striped")
        );
        assert!(JERSEY_COLORS.len() > 50);
    }
}
