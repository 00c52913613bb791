//! Static bot texts: per-emotion prompts, built-in fallback recommendations,
//! and user-facing message templates. All user-facing copy is Russian, as
//! shipped.

use crate::emotion::Emotion;

/// System prompt sent with every recommendation request.
pub const SYSTEM_PROMPT: &str =
    "Ты опытный арт-терапевт, который помогает людям через творчество.";

/// Art-therapy prompt for the LLM, per detected emotion.
pub fn prompt_for(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Angry => {
            "Пользователь испытывает гнев. Предложи ему персонализированные техники арт-терапии для работы с гневом. \
             Включи конкретные упражнения: рисование абстрактных форм, работу с красным цветом, создание коллажей для выражения эмоций. \
             Ответ должен быть поддерживающим, понимающим и практичным. Длина ответа: 150-200 слов."
        }
        Emotion::Disgust => {
            "Пользователь испытывает отвращение или неприятие. Предложи техники арт-терапии для работы с этими чувствами. \
             Включи упражнения по трансформации негативных образов, работу с текстурами, создание защитных символов. \
             Ответ должен быть деликатным и поддерживающим. Длина ответа: 150-200 слов."
        }
        Emotion::Fear => {
            "Пользователь испытывает страх или тревогу. Предложи успокаивающие техники арт-терапии. \
             Включи упражнения: рисование мандал, работу с мягкими цветами, создание образов безопасности и защиты. \
             Ответ должен быть успокаивающим и вселяющим уверенность. Длина ответа: 150-200 слов."
        }
        Emotion::Happy => {
            "Пользователь испытывает радость! Предложи техники арт-терапии для усиления и сохранения позитивных эмоций. \
             Включи упражнения: создание ярких коллажей, рисование солнечных образов, работу с теплыми цветами. \
             Ответ должен быть вдохновляющим и энергичным. Длина ответа: 150-200 слов."
        }
        Emotion::Sad => {
            "Пользователь испытывает грусть. Предложи мягкие техники арт-терапии для работы с печалью. \
             Включи упражнения: рисование дождя и его трансформации в радугу, работу с синими оттенками, создание образов поддержки. \
             Ответ должен быть сочувствующим и обнадеживающим. Длина ответа: 150-200 слов."
        }
        Emotion::Surprise => {
            "Пользователь испытывает удивление. Предложи техники арт-терапии для исследования новых эмоций. \
             Включи упражнения: экспериментирование с новыми материалами, создание неожиданных цветовых сочетаний. \
             Ответ должен быть любопытным и поощряющим исследование. Длина ответа: 150-200 слов."
        }
        Emotion::Neutral => {
            "Пользователь находится в нейтральном эмоциональном состоянии. Предложи техники арт-терапии для самопознания. \
             Включи упражнения: свободное рисование, создание автопортретов, работу с различными материалами для исследования внутреннего мира. \
             Ответ должен быть мягко направляющим и поощряющим самоисследование. Длина ответа: 150-200 слов."
        }
    }
}

/// Built-in recommendation used when no LLM is configured or the call fails.
pub fn fallback_for(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Angry => {
            "Я вижу, что вы испытываете сильные эмоции. Попробуйте технику \"Выплеск гнева на бумаге\":\n\n\
             🎨 Возьмите большой лист бумаги и яркие краски (особенно красный, оранжевый)\n\
             ✏️ Рисуйте резкими, энергичными движениями - линии, пятна, абстрактные формы\n\
             🖌️ Не думайте о красоте, просто выражайте свои чувства через движение кисти\n\
             ⚡ После завершения, посмотрите на рисунок и подумайте, что изменилось в ваших ощущениях\n\n\
             Это поможет безопасно выразить гнев и трансформировать его в творческую энергию."
        }
        Emotion::Fear => {
            "Я понимаю, что вы чувствуете тревогу. Попробуйте успокаивающую технику \"Мандала безопасности\":\n\n\
             🌸 Нарисуйте круг в центре листа\n\
             🎨 Заполните его повторяющимися узорами, используя мягкие цвета (голубой, зеленый, фиолетовый)\n\
             ✨ Добавьте символы, которые ассоциируются у вас с безопасностью и покоем\n\
             🕯️ Рисуйте медленно, концентрируясь на дыхании\n\n\
             Эта техника поможет успокоить ум и создать ощущение внутренней стабильности."
        }
        Emotion::Sad => {
            "Я чувствую вашу печаль. Попробуйте технику \"От дождя к радуге\":\n\n\
             💧 Начните с рисования дождя синими и серыми цветами\n\
             ☁️ Изобразите тучи, которые символизируют ваши грустные мысли\n\
             🌈 Постепенно добавьте яркие цвета, создавая радугу\n\
             ☀️ Завершите солнцем, пробивающимся сквозь облака\n\n\
             Этот процесс поможет символически пройти через грусть к надежде и обновлению."
        }
        _ => {
            "Творчество - это прекрасный способ исследовать свои эмоции. Попробуйте технику \"Свободное выражение\":\n\n\
             🎨 Выберите материалы, которые вас привлекают (краски, карандаши, пастель)\n\
             ✨ Начните рисовать без конкретной цели, следуя своим импульсам\n\
             🌈 Позвольте цветам и формам появляться естественно\n\
             💭 Не судите результат, просто наслаждайтесь процессом\n\n\
             Помните: в арт-терапии важен процесс, а не результат. Ваши эмоции имеют право на выражение."
        }
    }
}

/// `/start` greeting.
pub const WELCOME: &str = "🎨 Добро пожаловать в бот \"Арт-Терапевт\"!\n\n\
Я помогу вам исследовать свои эмоции через творчество. Просто отправьте мне фотографию своего рисунка, \
картины или даже селфи, и я проанализирую ваше эмоциональное состояние и предложу персонализированные \
техники арт-терапии.\n\n\
📸 Отправьте фото, чтобы начать!\n\
❓ Используйте /help для получения дополнительной информации.";

/// `/help` reply.
pub const HELP: &str = "🆘 Как пользоваться ботом:\n\n\
1️⃣ Отправьте фотографию:\n\
   • Ваш рисунок или картину\n\
   • Селфи (для анализа эмоций по лицу)\n\
   • Любое изображение, которое отражает ваше состояние\n\n\
2️⃣ Получите анализ эмоций и персональные рекомендации по арт-терапии\n\n\
3️⃣ Следуйте предложенным техникам для работы с эмоциями\n\n\
🎨 Арт-терапия помогает:\n\
   • Выразить сложные эмоции\n\
   • Снизить стресс и тревогу\n\
   • Лучше понять себя\n\
   • Найти внутренние ресурсы\n\n\
💡 Совет: Не беспокойтесь о качестве рисунка - важен процесс, а не результат!";

/// Reply to any non-photo, non-command message.
pub const SEND_PHOTO: &str = "📸 Пожалуйста, отправьте фотографию для анализа эмоций!\n\n\
Вы можете отправить:\n\
• Свой рисунок или картину\n\
• Селфи для анализа эмоций по лицу\n\
• Любое изображение, отражающее ваше состояние\n\n\
Используйте /help для получения подробной информации.";

/// Reply when the service finds no face in the photo.
pub const NO_FACE: &str = "😊 Я не смог определить эмоции на этом изображении, но это не проблема!\n\n\
🎨 *Универсальные техники арт-терапии:*\n\n\
Попробуйте технику \"Интуитивное рисование\":\n\
• Выберите цвета, которые вас сейчас привлекают\n\
• Рисуйте абстрактные формы, следуя внутренним импульсам\n\
• Не думайте о результате, сосредоточьтесь на процессе\n\
• После завершения подумайте, что вы чувствуете\n\n\
Творчество помогает лучше понять себя даже без анализа эмоций! 🌈";

/// Reply when the analysis service errored.
pub const ANALYZE_ERROR: &str =
    "❌ Произошла ошибка при анализе изображения. Попробуйте еще раз.";

/// Reply when photo processing failed before or after analysis.
pub const PROCESSING_ERROR: &str =
    "❌ Произошла ошибка при обработке фотографии. Попробуйте еще раз.";

/// Format the full "analysis complete" reply.
///
/// Single-asterisk bold: the reply is sent with Telegram's legacy Markdown
/// parse mode.
pub fn analysis_reply(emotion: Emotion, confidence: f32, recommendation: &str) -> String {
    format!(
        "🎭 *Анализ эмоций завершен!*\n\n\
         📊 Доминирующая эмоция: *{}*\n\
         📈 Уверенность: {:.2}%\n\n\
         🎨 *Персональные рекомендации по арт-терапии:*\n\n\
         {}\n\n\
         💡 Помните: творчество - это безопасное пространство для выражения любых эмоций!",
        emotion.as_str().to_uppercase(),
        confidence * 100.0,
        recommendation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_emotion_has_a_prompt() {
        for emotion in Emotion::ALL {
            let prompt = prompt_for(emotion);
            assert!(!prompt.is_empty());
            assert!(prompt.contains("арт-терапии"), "prompt for {emotion} off-topic");
        }
    }

    #[test]
    fn every_emotion_has_a_fallback() {
        for emotion in Emotion::ALL {
            assert!(!fallback_for(emotion).is_empty());
        }
    }

    #[test]
    fn dedicated_fallbacks_differ_from_generic() {
        let generic = fallback_for(Emotion::Neutral);
        for emotion in [Emotion::Angry, Emotion::Fear, Emotion::Sad] {
            assert_ne!(fallback_for(emotion), generic);
        }
        assert_eq!(fallback_for(Emotion::Happy), generic);
    }

    #[test]
    fn analysis_reply_includes_label_and_confidence() {
        let reply = analysis_reply(Emotion::Happy, 0.8734, "рисуйте солнце");
        assert!(reply.contains("HAPPY"));
        assert!(reply.contains("87.34%"));
        assert!(reply.contains("рисуйте солнце"));
    }
}
