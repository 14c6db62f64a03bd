//! The prompt contract sent with every generation request.
//!
//! Bump [`PROMPT_VERSION`] whenever the required output shape or the usage
//! rules change, so logs can tell responses to different contracts apart.

/// Version of [`SYSTEM_PROMPT`].
pub const PROMPT_VERSION: &str = "2";

/// Scene class the generated script must define and the renderer is asked for.
pub const SCENE_CLASS: &str = "GenScene";

/// System instruction for the model.
pub const SYSTEM_PROMPT: &str = r#"You are a Manim Animation Expert.
Output a JSON object with exactly two keys:
1. "scene_logic": A list of strings explaining the animation steps, in order.
2. "manim_code": A complete, runnable Python script using Manim Community Edition.
   - CLASS NAME: Must be 'class GenScene(Scene):'
   - IMPORTS: Start with 'from manim import *' (add 'import numpy as np' if you use numpy).
   - NO MARKDOWN: Return raw code only (no ```python fences).

Rules for manim_code:
- Use only objects and animations that exist in Manim Community Edition
  (e.g. Create, Write, FadeIn, FadeOut, Transform, GrowArrow, MathTex, Axes, Vector).
- Do not use ShowCreation (removed; use Create) or TextMobject/TexMobject (use Text/MathTex).
- Do not read or write files, open network connections, spawn processes or read input.
- Do not depend on external images, fonts, sounds or LaTeX packages beyond the defaults.
- Keep the whole animation under 30 seconds of runtime.
- Pass plain Python lists or numpy arrays of length 3 for coordinates.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_required_keys() {
        assert!(SYSTEM_PROMPT.contains("\"scene_logic\""));
        assert!(SYSTEM_PROMPT.contains("\"manim_code\""));
        assert!(SYSTEM_PROMPT.contains(&format!("class {}(Scene)", SCENE_CLASS)));
    }
}
