//! User-facing texts, keyboards and the interview summary format.

use crate::channels::{InlineButton, Keyboard, OutgoingReply};

use super::validation::CITIES;

pub const TRIGGER_APPLY: &str = "трудоустройство";
pub const TRIGGER_SALARY: &str = "зарплата";

pub const START_TEXT: &str = "\
Здравствуйте! Это бот набора преподавателей робототехники для младших школьников.

Чтобы подать заявку, нажмите «Трудоустройство». \
Вопросы об оплате — кнопка «Зарплата».";

pub const HELP: &str = "Введите 'Трудоустройство' для начала анкетирования.";
pub const SALARY: &str =
    "Оплата почасовая и зависит от количества групп. Подробности расскажем после собеседования.";

// ── Identity ────────────────────────────────────────────────────────

pub const ASK_FULL_NAME: &str = "Запишите ваше ФИО (формат: Фамилия Имя Отчество):";
pub const BAD_FULL_NAME: &str = "Неверный формат ФИО. Попробуйте снова:";
pub const ASK_CITY: &str = "Выберите город из списка:";
pub const BAD_CITY: &str = "Город не найден в списке. Попробуйте снова:";
pub const ASK_BIRTH_DATE: &str = "Запишите вашу дату рождения в формате ДД.ММ.ГГГГ:";
pub const BAD_BIRTH_DATE: &str = "Неверный формат даты. Попробуйте снова:";
pub const IDENTITY_SAVED: &str = "Спасибо за заполнение анкеты! Ваши данные сохранены.\n\
Как будете готовы к следующему этапу, введите /step2";
pub const ALREADY_APPLIED: &str = "Вы уже проходили анкетирование.";

// ── Interview ───────────────────────────────────────────────────────

pub const QUESTIONS: [&str; 5] = [
    "Расскажите о вашем опыте взаимодействия с младшими школьниками.",
    "Есть ли у вас опыт в робототехнике? Расскажите подробнее.",
    "В каких городах вы готовы проводить занятия?",
    "Сколько свободного времени в неделю вы готовы уделять занятиям?",
    "Какие ваши навыки вы считаете лучшими?",
];

/// Summary labels, one per question, in the same order.
pub const ANSWER_LABELS: [&str; 5] = [
    "Опыт взаимодействия с младшими школьниками",
    "Опыт в робототехнике",
    "Города для работы",
    "Свободное время",
    "Лучшие навыки",
];

pub const BAD_ANSWER: &str = "Ответ не может быть пустым. Попробуйте снова:";
pub const ASK_VERIFICATION_VIDEO: &str = "\
Запишите видеосообщение (кружок), в котором вы объясняете ребёнку \
любой простой алгоритм, и отправьте его сюда.";
pub const NEED_VIDEO_NOTE: &str = "Для верификации пришлите, пожалуйста, видеосообщение (кружок).";
pub const ANSWERS_HEADER: &str = "Вот ваши ответы:\n";
pub const CONFIRM_INTERVIEW: &str = "Пожалуйста, подтвердите или отклоните ваши данные:";
pub const INTERVIEW_CONFIRMED: &str = "Ваши данные подтверждены. Спасибо!";
pub const INTERVIEW_REJECTED: &str =
    "Ваши данные отклонены. Пожалуйста, начните заново: /step2";

// ── Lesson & address ────────────────────────────────────────────────

pub const ASK_LESSON_VIDEO: &str =
    "Пришлите видеосообщение (кружок) с фрагментом вашего пробного урока.";
pub const ASK_ADDRESS: &str =
    "Видео урока сохранено. Укажите адрес для отправки набора (город, улица, дом, квартира, индекс):";
pub const BAD_ADDRESS: &str = "Адрес не может быть пустым. Попробуйте снова:";
pub const ASK_ADDRESS_AGAIN: &str = "Введите адрес заново:";
pub const ADDRESS_CONFIRMED: &str = "Адрес сохранён. Набор будет отправлен в ближайшее время.";
pub const USE_ADDRESS_BUTTONS: &str =
    "Пожалуйста, подтвердите или измените адрес кнопками под сообщением.";

pub const LESSON1_TEXT: &str = "\
Урок 1. Знакомство с конструктором.
Дети собирают первую модель по схеме, знакомятся с моторами и датчиками. \
Задача преподавателя — показать, как детали соединяются, и дать каждому \
ребёнку собрать модель самостоятельно.";
pub const LESSON2_TEXT: &str = "\
Урок 2. Первый алгоритм.
Дети составляют последовательность команд для модели: вперёд, поворот, стоп. \
Объясняйте алгоритм на бытовых примерах: рецепт, дорога в школу.";
pub const LESSON3_TEXT: &str = "\
Урок 3. Датчики и условия.
Модель реагирует на препятствие с помощью датчика расстояния. \
Дети знакомятся с условием «если — то» и проверяют программу на практике.";

// ── Errors ──────────────────────────────────────────────────────────

pub const NOT_FOUND: &str = "Пользователь не найден в базе данных.";
pub const NOTHING_TO_CONFIRM: &str = "Нет данных для подтверждения. Начните этап заново.";
pub const VIDEO_SAVE_FAILED: &str = "Произошла ошибка при сохранении видео. Попробуйте ещё раз.";
pub const SAVE_FAILED: &str = "Не удалось сохранить данные. Попробуйте позже.";

pub const REMINDER: &str = "Напоминаем вам, что вы еще не прошли анкетирование. \
Пожалуйста, перейдите ко второму шагу: /step2";

// ── Callback payloads ───────────────────────────────────────────────

pub const CB_INTERVIEW_CONFIRM: &str = "interview:confirm";
pub const CB_INTERVIEW_REJECT: &str = "interview:reject";
pub const CB_ADDRESS_CONFIRM: &str = "address:confirm";
pub const CB_ADDRESS_EDIT: &str = "address:edit";

// ── Builders ────────────────────────────────────────────────────────

pub fn start_menu() -> OutgoingReply {
    OutgoingReply::text(START_TEXT).with_keyboard(Keyboard::Choices(vec![vec![
        "Зарплата".to_string(),
        "Трудоустройство".to_string(),
    ]]))
}

pub fn city_choice() -> OutgoingReply {
    OutgoingReply::text(ASK_CITY).with_keyboard(Keyboard::Choices(
        CITIES.iter().map(|c| vec![c.to_string()]).collect(),
    ))
}

/// Formats the five answers as `"<label>: <answer>\n"` lines in question order.
pub fn interview_summary(answers: &[String; 5]) -> String {
    ANSWER_LABELS
        .iter()
        .zip(answers.iter())
        .map(|(label, answer)| format!("{label}: {answer}\n"))
        .collect()
}

pub fn interview_confirmation() -> OutgoingReply {
    OutgoingReply::text(CONFIRM_INTERVIEW).with_keyboard(Keyboard::Inline(vec![vec![
        InlineButton::new("Подтвердить", CB_INTERVIEW_CONFIRM),
        InlineButton::new("Отклонить", CB_INTERVIEW_REJECT),
    ]]))
}

pub fn address_confirmation(address: &str) -> OutgoingReply {
    OutgoingReply::text(format!("Ваш адрес:\n{address}\n\nВсё верно?")).with_keyboard(
        Keyboard::Inline(vec![vec![
            InlineButton::new("Подтвердить", CB_ADDRESS_CONFIRM),
            InlineButton::new("Изменить", CB_ADDRESS_EDIT),
        ]]),
    )
}
