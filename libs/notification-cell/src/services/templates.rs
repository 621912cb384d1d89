//! Message bodies for every appointment notification. Each function renders
//! both the email and the SMS variant.

use crate::models::{Notification, VisitDetails};

const SIGN_OFF: &str = "Best regards,\nTeleConnect Team";

fn speciality_suffix(visit: &VisitDetails) -> String {
    visit
        .speciality
        .as_deref()
        .map(|s| format!(" ({})", s))
        .unwrap_or_default()
}

fn optional_line(label: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => format!("{}: {}\n", label, v),
        _ => String::new(),
    }
}

pub fn booking_confirmation_patient(visit: &VisitDetails) -> Notification {
    let email_body = format!(
        "Dear {patient},\n\n\
         Your appointment has been booked.\n\n\
         Date: {day}\n\
         Time: {time}\n\
         Doctor: Dr. {doctor}\n\
         {speciality}\
         Description: {description}\n\
         {symptoms}\
         Video room: {url}\n\n\
         {sign_off}\n",
        patient = visit.patient_name,
        day = visit.day,
        time = visit.time,
        doctor = visit.doctor_name,
        speciality = optional_line("Speciality", visit.speciality.as_deref()),
        description = visit.description,
        symptoms = optional_line("Symptoms", visit.symptoms.as_deref()),
        url = visit.room_url,
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: Appointment confirmed! Dr. {}{} on {} at {}. Room: {}",
        visit.doctor_name,
        speciality_suffix(visit),
        visit.day,
        visit.time,
        visit.room_url,
    );

    Notification {
        subject: "Welcome to TeleConnect".to_string(),
        email_body,
        sms_body,
    }
}

pub fn booking_confirmation_doctor(visit: &VisitDetails, patient_contact: &str) -> Notification {
    let email_body = format!(
        "Dear Dr. {doctor},\n\n\
         You have a new appointment scheduled.\n\n\
         Patient: {patient}\n\
         Contact: {contact}\n\
         Date: {day}\n\
         Time: {time}\n\
         Description: {description}\n\
         {symptoms}\
         Video room: {url}\n\n\
         {sign_off}\n",
        doctor = visit.doctor_name,
        patient = visit.patient_name,
        contact = patient_contact,
        day = visit.day,
        time = visit.time,
        description = visit.description,
        symptoms = optional_line("Symptoms", visit.symptoms.as_deref()),
        url = visit.room_url,
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: New appointment with {} on {} at {}. Room: {}",
        visit.patient_name, visit.day, visit.time, visit.room_url,
    );

    Notification {
        subject: format!("New Appointment - {}", visit.patient_name),
        email_body,
        sms_body,
    }
}

/// Sent to both participants five minutes before the visit.
pub fn imminent_reminder(visit: &VisitDetails, recipient_name: &str) -> Notification {
    let email_body = format!(
        "Dear {recipient},\n\n\
         Your appointment starts in 5 minutes.\n\n\
         Date: {day}\n\
         Time: {time}\n\
         Video room: {url}\n\n\
         {sign_off}\n",
        recipient = recipient_name,
        day = visit.day,
        time = visit.time,
        url = visit.room_url,
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: Your appointment starts in 5 minutes ({} {}). Join: {}",
        visit.day, visit.time, visit.room_url,
    );

    Notification {
        subject: "Appointment Reminder - Starting in 5 minutes".to_string(),
        email_body,
        sms_body,
    }
}

pub fn day_ahead_reminder(visit: &VisitDetails) -> Notification {
    let email_body = format!(
        "Dear {patient},\n\n\
         This is a reminder that you have an appointment tomorrow.\n\n\
         Date: {day}\n\
         Time: {time}\n\
         Doctor: Dr. {doctor}\n\
         {speciality}\
         Video room: {url}\n\
         {instructions}\n\
         Please be ready 5 minutes before your scheduled time.\n\n\
         {sign_off}\n",
        patient = visit.patient_name,
        day = visit.day,
        time = visit.time,
        doctor = visit.doctor_name,
        speciality = optional_line("Speciality", visit.speciality.as_deref()),
        url = visit.room_url,
        instructions = optional_line("Special Instructions", visit.instructions.as_deref()),
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect Reminder: Appointment with Dr. {} tomorrow at {}. Room: {}",
        visit.doctor_name, visit.time, visit.room_id,
    );

    Notification {
        subject: format!("Reminder: Appointment Tomorrow - Dr. {}", visit.doctor_name),
        email_body,
        sms_body,
    }
}

pub fn same_day_reminder(visit: &VisitDetails) -> Notification {
    let email_body = format!(
        "Dear {patient},\n\n\
         Your appointment with Dr. {doctor} is in about 2 hours.\n\n\
         Date: {day}\n\
         Time: {time}\n\
         Video room: {url}\n\n\
         Please be ready to join the video call 5 minutes before your scheduled time.\n\n\
         {sign_off}\n",
        patient = visit.patient_name,
        doctor = visit.doctor_name,
        day = visit.day,
        time = visit.time,
        url = visit.room_url,
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: Appointment with Dr. {} in 2 hours at {}. Room: {}",
        visit.doctor_name, visit.time, visit.room_id,
    );

    Notification {
        subject: format!("Reminder: Appointment in 2 Hours - Dr. {}", visit.doctor_name),
        email_body,
        sms_body,
    }
}

pub fn completion_notice(visit: &VisitDetails) -> Notification {
    let email_body = format!(
        "Dear {patient},\n\n\
         Your appointment has been marked as completed.\n\n\
         Date: {day}\n\
         Time: {time}\n\
         Doctor: Dr. {doctor}\n\
         {speciality}\
         Status: Completed\n\n\
         Thank you for choosing TeleConnect for your healthcare needs.\n\n\
         {sign_off}\n",
        patient = visit.patient_name,
        day = visit.day,
        time = visit.time,
        doctor = visit.doctor_name,
        speciality = optional_line("Speciality", visit.speciality.as_deref()),
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: Appointment with Dr. {} completed on {} at {}. Thank you for choosing TeleConnect!",
        visit.doctor_name, visit.day, visit.time,
    );

    Notification {
        subject: format!("Appointment Completed - Dr. {}", visit.doctor_name),
        email_body,
        sms_body,
    }
}

pub fn follow_up_scheduled(visit: &VisitDetails) -> Notification {
    let email_body = format!(
        "Dear {patient},\n\n\
         Dr. {doctor} has scheduled a follow-up appointment for you.\n\n\
         Date: {day}\n\
         Time: {time}\n\
         {instructions}\
         Video room: {url}\n\n\
         {sign_off}\n",
        patient = visit.patient_name,
        doctor = visit.doctor_name,
        day = visit.day,
        time = visit.time,
        instructions = optional_line("Special Instructions", visit.instructions.as_deref()),
        url = visit.room_url,
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: Follow-up with Dr. {} scheduled on {} at {}. Room: {}",
        visit.doctor_name, visit.day, visit.time, visit.room_url,
    );

    Notification {
        subject: format!("Follow-up Appointment Scheduled - Dr. {}", visit.doctor_name),
        email_body,
        sms_body,
    }
}

pub fn doctor_joined(visit: &VisitDetails) -> Notification {
    let email_body = format!(
        "Dear {patient},\n\n\
         Dr. {doctor} has joined your video consultation and is waiting for you.\n\n\
         Join now: {url}\n\n\
         {sign_off}\n",
        patient = visit.patient_name,
        doctor = visit.doctor_name,
        url = visit.room_url,
        sign_off = SIGN_OFF,
    );

    let sms_body = format!(
        "TeleConnect: Dr. {} has joined your video consultation. Join now: {}",
        visit.doctor_name, visit.room_url,
    );

    Notification {
        subject: format!("Dr. {} has joined your video consultation", visit.doctor_name),
        email_body,
        sms_body,
    }
}
