mod configuration_scenarios;
mod driver_scenarios;
