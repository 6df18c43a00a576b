//!Keyword sentiment for text logs that arrive without a score.

const WEIGHT: f64 = 0.6;

//matched as lowercase substrings, so Chinese and English terms share one pass
const NEGATIVE: &[&str] = &[
    "难过", "伤心", "害怕", "生气", "孤独", "哭", "不开心", "讨厌", "烦", "疼", "痛苦", "sad",
    "scared", "afraid", "angry", "lonely", "cry", "upset", "hurt", "hate", "unhappy",
];

const POSITIVE: &[&str] = &[
    "开心", "高兴", "快乐", "喜欢", "好玩", "棒", "兴奋", "happy", "glad", "fun", "love", "great",
    "excited",
];

///Scores `text` in `[-1.0, 1.0]`.
///
///Any negative keyword contributes `-0.6`, any positive keyword `+0.6`. Both can apply, so
///"不开心" (which also contains "开心") scores zero.
pub fn score(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let mut score = 0.0;
    if NEGATIVE.iter().any(|k| lowered.contains(k)) {
        score -= WEIGHT;
    }
    if POSITIVE.iter().any(|k| lowered.contains(k)) {
        score += WEIGHT;
    }
    f64::clamp(score, -1.0, 1.0)
}
