//! Prompt construction for the classification backends
//!
//! Both backends receive the same prompt; the racer treats them as
//! interchangeable. The prompt pins the response to a strict JSON shape so
//! normalization can reject anything else.

/// Instructions sent ahead of every message to analyze.
pub const SYSTEM_PROMPT: &str = r#"You are a misinformation and phishing detection system. Flag ONLY critical threats:

1. Phishing URLs and scams: suspicious links, fake login pages, financial scams, prize/lottery scams.
2. Scientific misinformation: false scientific or medical claims, climate denial.
3. Dangerous false news: fabricated major events, public safety hoaxes.
4. Health risks: dangerous medical advice, deadly food misinformation.

Do NOT flag humor, jokes, sarcasm, casual exaggeration, unverified rumors, hearsay, opinions, or minor inaccuracies.

Respond with ONLY this JSON object and nothing else:
{"isMisinformation":true/false,"confidence":0.0-1.0,"label":"FALSE/SCAM/TRUE","explanation":"brief explanation","sources":["source1"],"severity":"HIGH/NONE","isHumor":false}

Rules:
- severity MUST be "HIGH" or "NONE", no other value.
- Set severity="HIGH" only for the critical threats above.
- For everything else: severity="NONE", isMisinformation=false.

Message to analyze: "#;

/// Build the full prompt for a message and its extracted links.
pub fn build_prompt(text: &str, links: &[String]) -> String {
    let mut prompt = format!("{}\"{}\"", SYSTEM_PROMPT, text);
    if !links.is_empty() {
        prompt.push_str(&format!("\n\nLinks in message: {}", links.join(", ")));
    }
    prompt
}

/// Build the corroboration prompt re-dispatched after a local phishing hit.
///
/// Carries the local risk reasons so the backend can add context on top of
/// what the heuristic scorer already found.
pub fn build_enhanced_prompt(text: &str, url: &str, reasons: &[String]) -> String {
    format!(
        "Analyze this message for a phishing/scam attempt.\n\n\
         Message: \"{}\"\n\n\
         Suspicious URL detected: {}\n\
         Local analysis found: {}\n\n\
         Provide additional context about why this is dangerous and what the \
         attacker might be trying to do.",
        text,
        url,
        reasons.join("; ")
    )
}
