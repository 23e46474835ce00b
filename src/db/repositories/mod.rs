mod active_quest;
mod quest_log;
