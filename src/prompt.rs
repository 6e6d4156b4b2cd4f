use crate::language::Language;

pub fn system_message(language: Language) -> &'static str {
    match language {
        Language::Russian => {
            "Ты — русскоязычный ассистент по обработке текстов. Отвечай только на русском языке \
             и опирайся только на переданный текст. Не используй теги <think>, <reasoning> \
             и любые другие рассуждения вслух, не объясняй ход мыслей — сразу давай результат."
        }
        Language::English => {
            "You are a text-processing assistant. Answer in English only and rely only on the \
             text you are given. Do not use <think>, <reasoning> or any other visible reasoning \
             and do not explain your thought process; give the result directly."
        }
    }
}

pub fn chunk_summary_prompt(
    language: Language,
    chunk: &str,
    detail_level: u32,
    previous_summary: Option<&str>,
) -> String {
    match language {
        Language::Russian => {
            let context = previous_summary
                .map(|prev| {
                    format!(
                        "Краткое содержание предыдущего фрагмента (только для связности, не пересказывай его):\n{prev}\n\n"
                    )
                })
                .unwrap_or_default();
            format!(
                "{context}Перескажи этот фрагмент текста на русском языке в 5–6 предложениях: сюжет, \
                 ключевые события, персонажи, важные диалоги и темы.\n\
                 Фрагмент:\n{chunk}\n\n\
                 Уровень детализации: {detail_level} (1 — самый подробный, больше — более обобщённо).\n\
                 Без вступления и заключения. Отвечай ТОЛЬКО на русском языке и только по тексту фрагмента."
            )
        }
        Language::English => {
            let context = previous_summary
                .map(|prev| {
                    format!(
                        "Summary of the previous fragment (for continuity only, do not retell it):\n{prev}\n\n"
                    )
                })
                .unwrap_or_default();
            format!(
                "{context}Summarize this text fragment in English in 5-6 sentences: plot, key events, \
                 characters, important dialogue and themes.\n\
                 Fragment:\n{chunk}\n\n\
                 Detail level: {detail_level} (1 is the most detailed, higher is more general).\n\
                 No introduction or conclusion. Answer in English ONLY and only from the fragment."
            )
        }
    }
}

pub fn condense_prompt(language: Language, texts: &[String], detail_level: u32) -> String {
    let joined = texts.join("\n\n");
    match language {
        Language::Russian => format!(
            "На основе ТОЛЬКО этих пересказов составь более обобщённую сводку на русском языке.\n\
             Пересказы:\n{joined}\n\n\
             Сводка должна объединять сюжет и ключевые идеи, сохраняя порядок событий.\n\
             Уровень детализации: {detail_level}.\n\
             Ответ — 5–8 предложений, ТОЛЬКО на русском языке."
        ),
        Language::English => format!(
            "Using ONLY these summaries, write a more general summary in English.\n\
             Summaries:\n{joined}\n\n\
             Combine the plot and key ideas while keeping the order of events.\n\
             Detail level: {detail_level}.\n\
             Answer in 5-8 sentences, in English ONLY."
        ),
    }
}

pub fn narrative_prompt(language: Language, texts: &[String], detail_level: u32) -> String {
    let joined = texts.join("\n\n");
    match language {
        Language::Russian => format!(
            "Соедини следующие тексты из Контекста в единое связное повествование на русском языке, \
             сохраняя порядок событий.\n\
             Длина результата должна быть примерно равна суммарной длине входных текстов.\n\
             Уровень детализации: {detail_level}.\n\
             Просто дай связный текст на русском языке.\n\
             Контекст:\n\n{joined}"
        ),
        Language::English => format!(
            "Join the following texts from the Context into one continuous narrative in English, \
             keeping the order of events.\n\
             The result should be roughly as long as the input texts combined.\n\
             Detail level: {detail_level}.\n\
             Just give the connected text in English.\n\
             Context:\n\n{joined}"
        ),
    }
}

pub fn overview_prompt(language: Language, top_summary: &str) -> String {
    match language {
        Language::Russian => format!(
            "На основе ТОЛЬКО этой иерархической сводки составь полную общую сводку \
             в 10–20 предложениях на русском языке.\n\
             Иерархическая сводка:\n{top_summary}\n\n\
             Из сводки должны быть понятны сюжет, основные темы, ключевые персонажи и сюжетные повороты.\n\
             Отвечай ТОЛЬКО на русском языке."
        ),
        Language::English => format!(
            "Using ONLY this hierarchical summary, write a complete overall summary \
             in 10-20 sentences in English.\n\
             Hierarchical summary:\n{top_summary}\n\n\
             The plot, main themes, key characters and plot twists must be clear from it.\n\
             Answer in English ONLY."
        ),
    }
}

pub fn placeholder_text(language: Language, chunk_index: usize) -> String {
    match language {
        Language::Russian => format!("[Фрагмент {} не удалось пересказать.]", chunk_index + 1),
        Language::English => format!("[Fragment {} could not be summarized.]", chunk_index + 1),
    }
}
