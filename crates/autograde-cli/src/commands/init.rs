//! The `autograde init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("autograde.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("samples")?;
    write_if_missing(Path::new("samples/answer_key.csv"), SAMPLE_ANSWER_KEY)?;
    write_if_missing(Path::new("samples/answers.csv"), SAMPLE_ANSWERS)?;

    println!("\nNext steps:");
    println!("  1. Set GEMINI_API_KEY or edit autograde.toml with your API keys");
    println!("  2. Run: autograde validate --answer-key samples/answer_key.csv --answers samples/answers.csv");
    println!("  3. Run: autograde grade --answer-key samples/answer_key.csv --answers samples/answers.csv");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# autograde configuration

default_provider = "gemini"
default_model = "gemini-2.0-flash-lite"
default_temperature = 0.0
timeout_secs = 30
fallback_fraction = 0.6
parallelism = 1
cache_responses = true
# question_cap = 10
# roster_cap = 40

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#;

const SAMPLE_ANSWER_KEY: &str = "\
question_no,question_text,reference_answer,max_marks
1,What is the boiling point of water at sea level in Celsius?,100 degrees Celsius,2
2,Name the process by which plants make food using sunlight.,Photosynthesis,3
3,Why do we see lightning before hearing thunder?,Light travels much faster than sound,5
";

const SAMPLE_ANSWERS: &str = "\
student_name,question_no,answer_text
Asha,1,100 C
Asha,2,photosynthesis
Asha,3,because light is faster than sound
Ben,1,90 degrees
Ben,2,Respiration
Ben,3,\"Thunder is slower, light arrives first\"
";
