pub mod sanction_prompt;
