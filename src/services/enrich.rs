//! Pure enrichment of a raw roster record: rarity scoring and resolution
//! of display fields against a reference dataset snapshot.

use crate::model::pokedex::PokedexEntry;
use crate::model::snapshot::{DisplayView, PokemonView};
use crate::services::pokedex::PokedexData;

const MAX_IV: i64 = 15;

const WEIGHT_PERFECT: f64 = 8.0;
const WEIGHT_PERFECT_CP_SCALE: f64 = 8.0 / 10_000.0;
const WEIGHT_SHINY: f64 = 8.0;
const WEIGHT_LUCKY: f64 = 4.0;
const WEIGHT_SHADOW: f64 = 1.0;
const WEIGHT_PURIFIED: f64 = 1.5;
const WEIGHT_RARE_CLASS: f64 = 2.0;

pub struct DisplayInfo {
    pub name: String,
    pub sprite: String,
    pub type_colors: Vec<String>,
}

/// Eggs and records without display metadata are never enriched or ranked.
pub fn is_displayable(p: &PokemonView) -> bool {
    !p.is_egg && p.pokemon_display.is_some()
}

pub fn is_perfect(p: &PokemonView) -> bool {
    p.individual_attack == MAX_IV
        && p.individual_defense == MAX_IV
        && p.individual_stamina == MAX_IV
}

/// Additive rarity heuristic. A record with no qualifying attribute scores
/// 0 and does not qualify for the rarest ranking.
pub fn rarity_score(p: &PokemonView, entry: Option<&PokedexEntry>) -> f64 {
    let mut score = 0.0;
    if is_perfect(p) {
        score += WEIGHT_PERFECT + WEIGHT_PERFECT_CP_SCALE * p.cp as f64;
    }
    let display = p.pokemon_display.as_ref();
    if display.map_or(false, |d| d.shiny) {
        score += WEIGHT_SHINY;
    }
    if p.is_lucky {
        score += WEIGHT_LUCKY;
    }
    if display.map_or(false, |d| d.shadow) {
        score += WEIGHT_SHADOW;
    }
    if display.map_or(false, |d| d.purified) {
        score += WEIGHT_PURIFIED;
    }
    if entry.map_or(false, |e| e.is_rare_class()) {
        score += WEIGHT_RARE_CLASS;
    }
    score
}

/// Resolves name, sprite and type colors for one record. Total: unknown
/// species come back as a placeholder name with the fallback sprite.
pub fn display_info(dex: &PokedexData, p: &PokemonView) -> DisplayInfo {
    let default_display = DisplayView::default();
    let display = p.pokemon_display.as_ref().unwrap_or(&default_display);
    let entry = dex.entry_for_form(p.pokemon_id, &display.form_name);
    DisplayInfo {
        name: dex.resolve_display_name(p.pokemon_id, &display.form_name),
        sprite: dex.resolve_sprite(p.pokemon_id, display),
        type_colors: dex.resolve_type_colors(entry),
    }
}
